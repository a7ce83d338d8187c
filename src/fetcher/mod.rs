//! Report fetching: one domain in, one stored spreadsheet out.

mod analytics;
mod error;
mod query;
mod session;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::models::DownloadJob;
use crate::progress::ProgressSink;

pub use analytics::AnalyticsReportFetcher;
pub use error::{FetchCause, FetchError, FetchPhase};
pub use query::{report_url, traffic_filter};
pub use session::{ExportSession, SessionError, SessionLauncher, Target};

/// Downloads the report for one job and stores it.
///
/// Implementations report progress through `progress` and never panic on
/// progress delivery failures.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch(
        &self,
        job: &DownloadJob,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, FetchError>;
}
