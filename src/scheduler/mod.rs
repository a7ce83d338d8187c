//! Bulk report downloads with bounded concurrency.
//!
//! Keeps up to `concurrency` fetches in flight; when one settles the next
//! queued job starts, until the queue is empty. Every job's progress is
//! prefixed with its domain, and one summary line per job is written in
//! start order once everything has settled.

mod request;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::fetcher::ReportFetcher;
use crate::models::{DownloadJob, JobResult};
use crate::progress::{DomainProgress, ProgressChannel, ProgressSink};

pub use request::{BulkPlan, BulkRequest, BulkRequestError, BulkSite};

/// Final line of a bulk run that reached the end.
pub const ALL_DONE: &str = "All downloads completed";

pub struct BulkScheduler {
    fetcher: Arc<dyn ReportFetcher>,
    concurrency: usize,
}

impl BulkScheduler {
    pub fn new(fetcher: Arc<dyn ReportFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job and return their results in start order.
    ///
    /// Writes the opening line, each job's prefixed progress, one summary
    /// line per job, and finally [`ALL_DONE`].
    pub async fn run(&self, jobs: Vec<DownloadJob>, progress: Arc<dyn ProgressSink>) -> Vec<JobResult> {
        let total = jobs.len();
        info!(
            "Starting bulk download of {} sites (concurrency {})",
            total, self.concurrency
        );
        progress
            .emit(format!(
                "Starting bulk download for {} sites with concurrency {}",
                total, self.concurrency
            ))
            .await;

        let domains: Vec<String> = jobs.iter().map(|j| j.domain_name.clone()).collect();
        let mut results: Vec<Option<JobResult>> = vec![None; total];
        let mut queue = jobs.into_iter().enumerate();
        let mut join_set = JoinSet::new();

        loop {
            while join_set.len() < self.concurrency {
                let Some((index, job)) = queue.next() else {
                    break;
                };
                let fetcher = Arc::clone(&self.fetcher);
                let sink = DomainProgress::new(job.domain_name.clone(), Arc::clone(&progress));
                join_set.spawn(async move { (index, run_job(fetcher, job, sink).await) });
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((index, result))) => results[index] = Some(result),
                Some(Err(e)) => error!("Bulk download task failed to join: {}", e),
                None => break,
            }
        }

        let results: Vec<JobResult> = results
            .into_iter()
            .zip(domains)
            .map(|(result, domain_name)| {
                result.unwrap_or_else(|| JobResult::Failed {
                    domain_name,
                    error: "job did not finish".to_string(),
                })
            })
            .collect();

        for result in &results {
            progress.emit(result.summary_line()).await;
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "Bulk download finished: {} succeeded, {} failed",
            total - failed,
            failed
        );
        progress.emit(ALL_DONE.to_string()).await;
        results
    }

    /// Run a bulk download into `channel` and close it afterwards.
    ///
    /// A panic anywhere in the run is reported as the final line.
    pub async fn run_to_channel(&self, jobs: Vec<DownloadJob>, channel: Arc<ProgressChannel>) {
        let sink: Arc<dyn ProgressSink> = channel.clone();
        self.run_guarded(jobs, sink, &channel).await;
    }

    /// Run with progress going to `sink`, then close `channel`.
    async fn run_guarded(
        &self,
        jobs: Vec<DownloadJob>,
        sink: Arc<dyn ProgressSink>,
        channel: &ProgressChannel,
    ) {
        let run = AssertUnwindSafe(self.run(jobs, sink)).catch_unwind().await;

        if let Err(payload) = run {
            let message = panic_message(payload.as_ref());
            error!("Bulk download aborted: {}", message);
            if let Err(e) = channel
                .send(format!("Error during bulk download: {}", message))
                .await
            {
                warn!("Could not report bulk download failure: {}", e);
            }
        }

        if let Err(e) = channel.close().await {
            warn!("Progress channel already closed: {}", e);
        }
    }
}

async fn run_job(
    fetcher: Arc<dyn ReportFetcher>,
    job: DownloadJob,
    sink: DomainProgress<dyn ProgressSink>,
) -> JobResult {
    let domain_name = job.domain_name.clone();
    let outcome = AssertUnwindSafe(fetcher.fetch(&job, &sink))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(file_path)) => JobResult::Completed {
            domain_name,
            file_path,
        },
        Ok(Err(e)) => JobResult::Failed {
            domain_name,
            error: e.to_string(),
        },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Report fetch for {} panicked: {}", domain_name, message);
            JobResult::Failed {
                domain_name,
                error: message,
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchError, FetchPhase, SessionError};
    use crate::progress::{progress_channel, RecordingProgress};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps, tracks the in-flight peak, and fails domains starting with "bad".
    #[derive(Default)]
    struct FakeFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ReportFetcher for FakeFetcher {
        async fn fetch(
            &self,
            job: &DownloadJob,
            progress: &dyn ProgressSink,
        ) -> Result<PathBuf, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            progress.emit("Starting download process...".to_string()).await;
            tokio::time::sleep(Duration::from_millis(10 * (job.domain_name.len() as u64 % 3 + 1))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if job.domain_name.starts_with("panic") {
                panic!("fetcher blew up");
            }
            if job.domain_name.starts_with("bad") {
                return Err(FetchError::new(
                    &job.domain_name,
                    FetchPhase::Login,
                    SessionError::Browser("invalid credentials".into()),
                ));
            }
            progress.emit("Download completed".to_string()).await;
            Ok(PathBuf::from(format!("reports/{}.xlsx", job.domain_name)))
        }
    }

    fn jobs(domains: &[&str]) -> Vec<DownloadJob> {
        domains
            .iter()
            .map(|d| DownloadJob::new(*d, None, 0))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let fetcher = Arc::new(FakeFetcher::default());
        let scheduler = BulkScheduler::new(fetcher.clone(), 2);
        let recorder = Arc::new(RecordingProgress::new());

        let results = scheduler
            .run(
                jobs(&["a.com", "bb.com", "ccc.com", "d.com", "ee.com", "fff.com"]),
                recorder.clone(),
            )
            .await;

        assert_eq!(results.len(), 6);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);

        let messages = recorder.messages().await;
        assert_eq!(
            messages.first().map(String::as_str),
            Some("Starting bulk download for 6 sites with concurrency 2")
        );
        let summaries: Vec<_> = messages
            .iter()
            .filter(|m| m.starts_with("Completed download for ") || m.starts_with("Error processing "))
            .collect();
        assert_eq!(summaries.len(), 6);
        assert_eq!(messages.last().map(String::as_str), Some(ALL_DONE));
        assert_eq!(summaries[0], "Completed download for a.com: reports/a.com.xlsx");
        assert_eq!(summaries[5], "Completed download for fff.com: reports/fff.com.xlsx");
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let scheduler = BulkScheduler::new(Arc::new(FakeFetcher::default()), 3);
        let recorder = Arc::new(RecordingProgress::new());

        let results = scheduler
            .run(jobs(&["a.com", "bad.com", "c.com"]), recorder.clone())
            .await;

        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());

        let messages = recorder.messages().await;
        let errors: Vec<_> = messages.iter().filter(|m| m.contains("bad.com")).collect();
        assert!(errors.iter().all(|m| !m.contains("a.com") && !m.contains("c.com")));
        assert!(messages.contains(
            &"Error processing bad.com: logging in: invalid credentials".to_string()
        ));
    }

    #[tokio::test]
    async fn test_job_progress_is_prefixed_and_ordered() {
        let scheduler = BulkScheduler::new(Arc::new(FakeFetcher::default()), 2);
        let recorder = Arc::new(RecordingProgress::new());
        scheduler
            .run(jobs(&["a.com", "b.com"]), recorder.clone())
            .await;

        let messages = recorder.messages().await;
        for domain in ["a.com", "b.com"] {
            let own: Vec<_> = messages
                .iter()
                .filter(|m| m.starts_with(&format!("{}: ", domain)))
                .cloned()
                .collect();
            assert_eq!(
                own,
                vec![
                    format!("{}: Starting download process...", domain),
                    format!("{}: Download completed", domain),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_failure() {
        let scheduler = BulkScheduler::new(Arc::new(FakeFetcher::default()), 2);
        let recorder = Arc::new(RecordingProgress::new());
        let results = scheduler
            .run(jobs(&["panic.com", "ok.com"]), recorder.clone())
            .await;

        assert_eq!(
            results[0],
            JobResult::Failed {
                domain_name: "panic.com".into(),
                error: "fetcher blew up".into(),
            }
        );
        assert!(results[1].is_success());
        assert_eq!(recorder.messages().await.last().map(String::as_str), Some(ALL_DONE));
    }

    #[tokio::test]
    async fn test_run_to_channel_closes_after_last_line() {
        let scheduler = BulkScheduler::new(Arc::new(FakeFetcher::default()), 1);
        let (channel, stream) = progress_channel();
        let channel = Arc::new(channel);

        scheduler
            .run_to_channel(jobs(&["a.com"]), channel.clone())
            .await;
        assert!(channel.is_closed().await);

        let events = stream.collect_events().await;
        assert_eq!(events.last().map(|e| e.status.as_str()), Some(ALL_DONE));
        assert_eq!(events.len(), 5);
    }

    /// Forwards to a channel but blows up on the first summary line.
    struct ExplodingSink {
        channel: Arc<ProgressChannel>,
    }

    #[async_trait]
    impl ProgressSink for ExplodingSink {
        async fn emit(&self, message: String) {
            if message.starts_with("Completed download for ") {
                panic!("summary writer failed");
            }
            self.channel.emit(message).await;
        }
    }

    #[tokio::test]
    async fn test_orchestration_panic_is_reported_and_closes() {
        let scheduler = BulkScheduler::new(Arc::new(FakeFetcher::default()), 1);
        let (channel, stream) = progress_channel();
        let channel = Arc::new(channel);
        let sink = Arc::new(ExplodingSink {
            channel: channel.clone(),
        });

        scheduler
            .run_guarded(jobs(&["a.com"]), sink, &channel)
            .await;
        assert!(channel.is_closed().await);

        let statuses: Vec<String> = stream
            .collect_events()
            .await
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses.last().map(String::as_str),
            Some("Error during bulk download: summary writer failed")
        );
        assert!(!statuses.iter().any(|s| s == ALL_DONE));
        assert_eq!(
            statuses
                .iter()
                .filter(|s| s.starts_with("Error during bulk download"))
                .count(),
            1
        );
    }
}
