//! Report fetcher for the analytics service's organic pages export.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::{FetchCause, FetchError, FetchPhase, PhaseTracker};
use super::query::report_url;
use super::session::{ExportSession, SessionLauncher, Target};
use super::ReportFetcher;
use crate::config::{AnalyticsConfig, Credentials};
use crate::models::DownloadJob;
use crate::progress::ProgressSink;
use crate::storage::{ReportStore, ReportStoreError};
use crate::utils::previous_month_tag_now;

/// Logs in, opens the report for the previous month, exports it as a
/// spreadsheet and stores it as `<reports_dir>/<domain>.xlsx`.
pub struct AnalyticsReportFetcher {
    launcher: Arc<dyn SessionLauncher>,
    analytics: AnalyticsConfig,
    store: ReportStore,
    job_timeout: Duration,
    month: Option<String>,
}

impl AnalyticsReportFetcher {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        analytics: AnalyticsConfig,
        store: ReportStore,
        job_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            analytics,
            store,
            job_timeout,
            month: None,
        }
    }

    /// Pin the report month instead of using the previous calendar month.
    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.month = Some(month.into());
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    async fn run(
        &self,
        job: &DownloadJob,
        progress: &dyn ProgressSink,
        phase: &PhaseTracker,
    ) -> Result<PathBuf, FetchError> {
        let domain = job.domain_name.as_str();

        progress.emit("Starting download process...".to_string()).await;

        phase.enter(FetchPhase::Prepare);
        self.store
            .path_for(domain)
            .map_err(|e| FetchError::new(domain, FetchPhase::Prepare, e))?;

        let credentials = self
            .analytics
            .credentials()
            .ok_or_else(|| FetchError::new(domain, FetchPhase::Login, FetchCause::MissingCredentials))?;

        phase.enter(FetchPhase::Launch);
        let mut session = self
            .launcher
            .launch()
            .await
            .map_err(|e| FetchError::new(domain, FetchPhase::Launch, e))?;
        debug!("Browser session ready for {}", domain);

        let result = self
            .drive(session.as_mut(), job, &credentials, progress, phase)
            .await;
        session.close().await;
        result
    }

    async fn drive(
        &self,
        session: &mut dyn ExportSession,
        job: &DownloadJob,
        credentials: &Credentials,
        progress: &dyn ProgressSink,
        phase: &PhaseTracker,
    ) -> Result<PathBuf, FetchError> {
        let domain = job.domain_name.as_str();
        let selectors = &self.analytics.selectors;
        let wait = &self.analytics.wait;

        phase.enter(FetchPhase::Login);
        progress.emit("Logging in...".to_string()).await;
        let login = async {
            session.goto(&self.analytics.login_url).await?;
            session
                .wait_for(&Target::css(&selectors.username_field), wait.page_ready())
                .await?;
            session
                .fill(&selectors.username_field, &credentials.username)
                .await?;
            session
                .fill(&selectors.password_field, &credentials.password)
                .await?;
            session.click(&Target::css(&selectors.submit_button)).await?;
            session.wait_for_navigation(wait.page_ready()).await
        };
        login
            .await
            .map_err(|e| FetchError::new(domain, FetchPhase::Login, e))?;

        phase.enter(FetchPhase::Query);
        progress.emit("Navigating to data page...".to_string()).await;
        let month = self.month.clone().unwrap_or_else(previous_month_tag_now);
        let url = report_url(&self.analytics.query_url, job, &month);
        debug!("Opening report page {}", url);
        let export_button = Target::css(&selectors.export_button);
        let query = async {
            session.goto(&url).await?;
            session.wait_for(&export_button, wait.page_ready()).await
        };
        query
            .await
            .map_err(|e| FetchError::new(domain, FetchPhase::Query, e))?;

        phase.enter(FetchPhase::Export);
        progress.emit("Exporting data...".to_string()).await;
        let spreadsheet = Target::text(&selectors.spreadsheet_option);
        let export = async {
            session.click(&export_button).await?;
            session.wait_for(&spreadsheet, wait.export_ready()).await
        };
        export
            .await
            .map_err(|e| FetchError::new(domain, FetchPhase::Export, e))?;

        phase.enter(FetchPhase::Download);
        progress.emit("Downloading file...".to_string()).await;
        let staged = session
            .click_and_download(&spreadsheet, wait.download())
            .await
            .map_err(|e| FetchError::new(domain, FetchPhase::Download, e))?;

        phase.enter(FetchPhase::Save);
        let save_error = |e: ReportStoreError| FetchError::new(domain, FetchPhase::Save, e);
        self.store.ensure_dir().await.map_err(save_error)?;
        if self.store.remove_existing(domain).await.map_err(save_error)? {
            progress.emit("Existing file deleted".to_string()).await;
        }
        let path = self
            .store
            .persist(domain, &staged)
            .await
            .map_err(save_error)?;

        progress.emit("Download completed".to_string()).await;
        Ok(path)
    }
}

#[async_trait]
impl ReportFetcher for AnalyticsReportFetcher {
    async fn fetch(
        &self,
        job: &DownloadJob,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, FetchError> {
        info!("Downloading report for {}", job.domain_name);
        let phase = PhaseTracker::default();

        // Expiry drops the in-flight future, and with it the browser session.
        let result = match tokio::time::timeout(self.job_timeout, self.run(job, progress, &phase))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Report for {} exceeded {}s while {}",
                    job.domain_name,
                    self.job_timeout.as_secs(),
                    phase.current()
                );
                Err(FetchError::new(
                    &job.domain_name,
                    phase.current(),
                    FetchCause::Timeout(self.job_timeout),
                ))
            }
        };

        match &result {
            Ok(path) => info!("Stored report for {} at {}", job.domain_name, path.display()),
            Err(e) => warn!("Report for {} failed: {}", job.domain_name, e),
        }
        result
    }
}
