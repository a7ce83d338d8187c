//! Analytics service endpoints, selectors, credentials and wait policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::browser::non_empty_env;

const DEFAULT_LOGIN_URL: &str = "https://app.toolsminati.com/login";
const DEFAULT_QUERY_URL: &str = "https://sr.toolsminati.com/analytics/organic/pages/";

/// Username/password for the analytics login form.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// CSS selectors and labels of the analytics UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSelectors {
    pub username_field: String,
    pub password_field: String,
    pub submit_button: String,
    pub export_button: String,
    /// Visible text of the spreadsheet entry in the export menu.
    pub spreadsheet_option: String,
}

impl Default for AnalyticsSelectors {
    fn default() -> Self {
        Self {
            username_field: "#amember-login".to_string(),
            password_field: "#amember-pass".to_string(),
            submit_button: r#"input[type="submit"]"#.to_string(),
            export_button: r#"button[aria-label="Export organic pages data"]"#.to_string(),
            spreadsheet_option: "Excel".to_string(),
        }
    }
}

/// How long to wait for the external UI to become ready.
///
/// Readiness is polled; these are upper bounds, not fixed sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Wait for the query page to show the export button.
    pub page_ready_ms: u64,
    /// Wait for the export menu to offer the spreadsheet option.
    pub export_ready_ms: u64,
    /// Wait for the browser to finish writing the download.
    pub download_ms: u64,
    /// Delay between readiness checks.
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            page_ready_ms: 30_000,
            export_ready_ms: 30_000,
            download_ms: 120_000,
            poll_interval_ms: 250,
        }
    }
}

impl WaitConfig {
    pub fn page_ready(&self) -> Duration {
        Duration::from_millis(self.page_ready_ms)
    }

    pub fn export_ready(&self) -> Duration {
        Duration::from_millis(self.export_ready_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// Analytics service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_query_url")]
    pub query_url: String,
    /// Prefer the ANALYTICS_USERNAME environment variable.
    #[serde(default, skip_serializing)]
    pub username: Option<String>,
    /// Prefer the ANALYTICS_PASSWORD environment variable.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub selectors: AnalyticsSelectors,
    #[serde(default)]
    pub wait: WaitConfig,
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            query_url: default_query_url(),
            username: None,
            password: None,
            selectors: AnalyticsSelectors::default(),
            wait: WaitConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Apply environment variable overrides.
    ///
    /// - `ANALYTICS_USERNAME` / `ANALYTICS_PASSWORD` - login credentials
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(username) = non_empty_env("ANALYTICS_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = non_empty_env("ANALYTICS_PASSWORD") {
            self.password = Some(password);
        }
        self
    }

    /// Both credentials, if configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_need_both_parts() {
        let mut config = AnalyticsConfig {
            username: Some("user@example.com".into()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
        config.password = Some("secret".into());
        assert_eq!(config.credentials().unwrap().username, "user@example.com");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            username: "u".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = AnalyticsConfig {
            username: Some("u".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let wait = WaitConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(wait.poll_interval(), Duration::from_millis(10));
    }
}
