//! Commands that drive a running server.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::client::ProgressClient;
use crate::scheduler::BulkRequest;

use super::output::styled_status;

fn print_event(event: &crate::progress::ProgressEvent) {
    println!("{} {}", style("→").cyan(), styled_status(&event.status));
}

/// Download one report through the server.
pub async fn cmd_remote_download(url: &str, domain: &str) -> anyhow::Result<()> {
    let client = ProgressClient::new(url)?;
    let events = client.download(domain, print_event).await?;

    match events.last() {
        Some(last) if last.status == "Report downloaded successfully" => Ok(()),
        Some(last) => anyhow::bail!("{}", last.status),
        None => anyhow::bail!("Server closed the stream without reporting progress"),
    }
}

/// Start a bulk download on the server and follow it to the end.
pub async fn cmd_remote_bulk(url: &str, file: &Path) -> anyhow::Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request = BulkRequest::parse(&body)?;

    let client = ProgressClient::new(url)?;
    let events = client.bulk(&request, print_event).await?;

    let failed = events
        .iter()
        .filter(|e| e.status.starts_with("Error processing "))
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, request.sites.len());
    }
    Ok(())
}
