//! HTTP API for report downloads.
//!
//! - `GET /api/sites/:domain/download-report` streams one download
//! - `POST /api/sites/bulk-download` streams a bulk run
//! - `GET /api/sites/check-excel` and `DELETE /api/sites/:domain/delete-excel`
//!   inspect and remove stored reports

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use crate::browser::ChromeLauncher;
use crate::config::{BulkConfig, Settings};
use crate::fetcher::{AnalyticsReportFetcher, ReportFetcher};
use crate::repository::{FileSiteDirectory, MemorySiteDirectory, SiteDirectory};
use crate::storage::ReportStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn ReportFetcher>,
    pub sites: Arc<dyn SiteDirectory>,
    pub store: ReportStore,
    pub bulk: BulkConfig,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let store = ReportStore::new(settings.reports_dir.clone());
        Self {
            fetcher: build_fetcher(settings, store.clone()),
            sites: build_site_directory(settings),
            store,
            bulk: settings.bulk,
        }
    }
}

/// The Chrome-driven fetcher configured from `settings`.
pub fn build_fetcher(settings: &Settings, store: ReportStore) -> Arc<dyn ReportFetcher> {
    let launcher = ChromeLauncher::new(settings.browser.clone(), settings.analytics.wait);
    Arc::new(AnalyticsReportFetcher::new(
        Arc::new(launcher),
        settings.analytics.clone(),
        store,
        settings.job_timeout,
    ))
}

/// Sites file if one is configured, otherwise the sites listed in config.
pub fn build_site_directory(settings: &Settings) -> Arc<dyn SiteDirectory> {
    match settings.sites_file {
        Some(ref path) => Arc::new(FileSiteDirectory::new(path.clone())),
        None => Arc::new(MemorySiteDirectory::new(settings.sites.clone())),
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    settings
        .ensure_directories()
        .context("Failed to prepare reports directory")?;

    let state = AppState::new(settings);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
