//! Chrome-backed export sessions.
//!
//! Each job gets its own browser process and profile (or its own browser
//! context when connected to a remote browser) and its own staging
//! directory for downloads.

#[cfg(feature = "browser")]
mod chrome;

use std::path::{Path, PathBuf};

#[cfg(not(feature = "browser"))]
use async_trait::async_trait;
use tracing::info;

use crate::fetcher::SessionError;
#[cfg(not(feature = "browser"))]
use crate::fetcher::{ExportSession, SessionLauncher};

#[cfg(feature = "browser")]
pub use chrome::ChromeLauncher;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find the Chrome executable, preferring an explicitly configured one.
pub fn find_chrome(configured: Option<&Path>) -> Result<PathBuf, SessionError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(SessionError::Unavailable(format!(
            "configured Chrome executable '{}' does not exist",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(SessionError::Unavailable(
        "Chrome/Chromium not found. Install it or set CHROME_PATH \
         (or BROWSER_URL to use a running browser)"
            .to_string(),
    ))
}

/// XPath matching the element whose own trimmed text is exactly `text`.
pub fn xpath_for_text(text: &str) -> String {
    let literal = if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    };
    format!("//*[normalize-space(text())={}]", literal)
}

/// Stand-in used when the crate is built without the `browser` feature.
#[cfg(not(feature = "browser"))]
pub struct ChromeLauncher;

#[cfg(not(feature = "browser"))]
impl ChromeLauncher {
    pub fn new(
        _config: crate::config::BrowserEngineConfig,
        _wait: crate::config::WaitConfig,
    ) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn ExportSession>, SessionError> {
        Err(SessionError::Unavailable(
            "built without browser support; rebuild with --features browser".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_for_plain_text() {
        assert_eq!(
            xpath_for_text("Excel"),
            "//*[normalize-space(text())='Excel']"
        );
    }

    #[test]
    fn test_xpath_for_text_with_quotes() {
        assert_eq!(
            xpath_for_text("Bob's"),
            "//*[normalize-space(text())=\"Bob's\"]"
        );
        assert_eq!(
            xpath_for_text("a'b\"c"),
            "//*[normalize-space(text())=concat('a', \"'\", 'b\"c')]"
        );
    }

    #[test]
    fn test_missing_configured_chrome_is_unavailable() {
        let err = find_chrome(Some(Path::new("/nonexistent/chrome"))).unwrap_err();
        assert!(matches!(err, SessionError::Unavailable(_)));
    }
}
