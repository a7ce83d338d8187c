//! Local bulk download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::fetcher::{FetchError, ReportFetcher};
use crate::models::DownloadJob;
use crate::progress::ProgressSink;
use crate::scheduler::{BulkRequest, BulkScheduler};
use crate::server::build_fetcher;
use crate::storage::ReportStore;

use super::output::BarProgress;

/// Advances a progress bar each time a fetch settles.
struct CountingFetcher {
    inner: Arc<dyn ReportFetcher>,
    bar: ProgressBar,
}

#[async_trait]
impl ReportFetcher for CountingFetcher {
    async fn fetch(
        &self,
        job: &DownloadJob,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, FetchError> {
        let result = self.inner.fetch(job, progress).await;
        self.bar.set_message(job.domain_name.clone());
        self.bar.inc(1);
        result
    }
}

/// Run a bulk download described by a request file.
pub async fn cmd_bulk(
    settings: &Settings,
    file: &Path,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut request = BulkRequest::parse(&body)?;
    if concurrency.is_some() {
        request.concurrency = concurrency;
    }
    let plan = request.plan(&settings.bulk);

    let bar = ProgressBar::new(plan.jobs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let store = ReportStore::new(settings.reports_dir.clone());
    let fetcher = Arc::new(CountingFetcher {
        inner: build_fetcher(settings, store),
        bar: bar.clone(),
    });
    let scheduler = BulkScheduler::new(fetcher, plan.concurrency);
    let results = scheduler
        .run(plan.jobs, Arc::new(BarProgress::new(bar.clone())))
        .await;
    bar.finish_and_clear();

    let failed = results.iter().filter(|r| !r.is_success()).count();
    println!(
        "{} {} downloaded, {} failed",
        if failed == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        results.len() - failed,
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, results.len());
    }
    Ok(())
}
