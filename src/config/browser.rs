//! Browser engine configuration types.
//!
//! These types live outside the `browser` feature so that config parsing
//! and serialization work in builds without Chrome support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the export flow while debugging selectors.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium executable. Auto-detected when unset.
    /// Can also be set via CHROME_PATH environment variable.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            chrome_args: Vec::new(),
            remote_url: None,
            timeout: default_timeout(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `CHROME_PATH` - Chrome executable to launch
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env("BROWSER_URL") {
            self.remote_url = Some(url);
        }
        if let Some(path) = non_empty_env("CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
