//! Stored report commands.

use console::style;

use crate::config::Settings;
use crate::storage::{ReportStore, ReportStoreError};

/// Show whether a report exists for `domain`.
pub async fn cmd_report_status(settings: &Settings, domain: &str) -> anyhow::Result<()> {
    let store = ReportStore::new(settings.reports_dir.clone());
    let path = store.path_for(domain)?;

    if store.exists(domain).await? {
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        println!(
            "{} {} ({} bytes)",
            style("✓").green(),
            path.display(),
            size
        );
    } else {
        println!("{} No report at {}", style("✗").dim(), path.display());
    }
    Ok(())
}

/// Delete the stored report for `domain`.
pub async fn cmd_report_delete(settings: &Settings, domain: &str) -> anyhow::Result<()> {
    let store = ReportStore::new(settings.reports_dir.clone());
    match store.delete(domain).await {
        Ok(path) => {
            println!("{} Deleted {}", style("✓").green(), path.display());
            Ok(())
        }
        Err(ReportStoreError::NotFound(path)) => {
            println!("{} No report at {}", style("✗").dim(), path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
