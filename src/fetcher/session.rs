//! Browser session boundary used by the report fetcher.
//!
//! The fetcher drives the export flow through these primitives so that the
//! step sequence can run against Chrome or against a scripted fake.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Element on the page, located either by CSS selector or by its visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Css(String),
    Text(String),
}

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Css(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Target::Text(text.into())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Css(selector) => write!(f, "'{}'", selector),
            Target::Text(text) => write!(f, "text \"{}\"", text),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),
    #[error("{target} did not appear within {}s", .waited.as_secs())]
    NotReady { target: String, waited: Duration },
    #[error("page did not settle within {}s", .0.as_secs())]
    NavigationTimeout(Duration),
    #[error("download failed: {0}")]
    Download(String),
    #[error("{0}")]
    Browser(String),
}

/// Opens isolated browser sessions, one per job.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn ExportSession>, SessionError>;
}

/// One isolated browsing session.
///
/// Dropping a session must tear down its browser; `close` is the graceful
/// path.
#[async_trait]
pub trait ExportSession: Send {
    /// Navigate and wait for the load to finish.
    async fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    /// Poll until `target` is present or `timeout` passes.
    async fn wait_for(&mut self, target: &Target, timeout: Duration) -> Result<(), SessionError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), SessionError>;

    async fn click(&mut self, target: &Target) -> Result<(), SessionError>;

    /// Wait for the navigation triggered by the previous action.
    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), SessionError>;

    /// Click `target` and wait for the download it starts.
    ///
    /// Returns the path of the finished file inside the session's staging
    /// area. The file must outlive the call until the session is closed.
    async fn click_and_download(
        &mut self,
        target: &Target,
        timeout: Duration,
    ) -> Result<PathBuf, SessionError>;

    async fn close(self: Box<Self>);
}
