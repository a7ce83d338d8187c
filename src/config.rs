//! Configuration management for sitereports using the prefer crate.

mod analytics;
mod browser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SiteRecord;

pub use analytics::{AnalyticsConfig, AnalyticsSelectors, Credentials, WaitConfig};
pub use browser::BrowserEngineConfig;
use browser::non_empty_env;

/// Default reports subdirectory name.
const REPORTS_SUBDIR: &str = "reports";

/// Default bind address for the web server.
pub const DEFAULT_BIND: &str = "127.0.0.1:3030";

/// Default per-job deadline (10 minutes).
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config '{path}': {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Bulk download limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Concurrency used when a bulk request does not specify one.
    pub default_concurrency: usize,
    /// Requests asking for more are clamped down to this.
    pub max_concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 4,
            max_concurrency: 16,
        }
    }
}

impl BulkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "bulk.default_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "bulk.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Directory holding one report per domain.
    pub reports_dir: PathBuf,
    /// Sites file consulted by single-domain downloads.
    pub sites_file: Option<PathBuf>,
    /// Sites declared inline in the config file.
    pub sites: Vec<SiteRecord>,
    /// Web server bind address.
    pub bind: String,
    /// Deadline for one report download.
    pub job_timeout: Duration,
    pub bulk: BulkConfig,
    pub analytics: AnalyticsConfig,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = PathBuf::from(".");
        Self {
            reports_dir: data_dir.join(REPORTS_SUBDIR),
            data_dir,
            sites_file: None,
            sites: Vec::new(),
            bind: DEFAULT_BIND.to_string(),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            bulk: BulkConfig::default(),
            analytics: AnalyticsConfig::default(),
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Reject values that would make every download fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bulk.validate()?;
        if self.job_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "job_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            reports_dir: data_dir.join(REPORTS_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Ensure the reports directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.reports_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create reports directory '{}': {}",
                    self.reports_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Reports directory (defaults to `<data_dir>/reports`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<String>,
    /// Sites file (TOML, YAML or JSON list of sites).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites_file: Option<String>,
    /// Web server bind address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Per-job deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "BulkConfig::is_default")]
    pub bulk: BulkConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default, skip_serializing_if = "BrowserEngineConfig::is_default")]
    pub browser: BrowserEngineConfig,
    /// Inline site list, used when no sites file is configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<SiteRecord>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers sitereports config files in standard locations.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load("sitereports").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default_with_env()),
            },
            Err(_) => {
                // No config file found, use defaults with env overrides
                Ok(Self::default_with_env())
            }
        }
    }

    /// Default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string())),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.analytics = std::mem::take(&mut self.analytics).with_env_overrides();
        self.browser = std::mem::take(&mut self.browser).with_env_overrides();
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.reports_dir = settings.data_dir.join(REPORTS_SUBDIR);
        } else {
            settings.data_dir = base_dir.to_path_buf();
            settings.reports_dir = base_dir.join(REPORTS_SUBDIR);
        }
        if let Some(ref reports_dir) = self.reports_dir {
            settings.reports_dir = self.resolve_path(reports_dir, &settings.data_dir);
        }
        if let Some(ref sites_file) = self.sites_file {
            settings.sites_file = Some(self.resolve_path(sites_file, base_dir));
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(secs) = self.job_timeout_secs {
            settings.job_timeout = Duration::from_secs(secs);
        }
        settings.bulk = self.bulk;
        settings.analytics = self.analytics.clone();
        settings.browser = self.browser.clone();
        settings.sites = self.sites.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    // Environment variables take precedence over the config file
    if let Some(dir) = non_empty_env("SITEREPORTS_REPORTS_DIR") {
        tracing::debug!("Using SITEREPORTS_REPORTS_DIR from environment: {}", dir);
        settings.reports_dir = config.resolve_path(&dir, &base_dir);
    }
    if let Some(file) = non_empty_env("SITEREPORTS_SITES_FILE") {
        tracing::debug!("Using SITEREPORTS_SITES_FILE from environment: {}", file);
        settings.sites_file = Some(config.resolve_path(&file, &base_dir));
    }

    settings.validate()?;

    if settings.analytics.credentials().is_none() {
        tracing::warn!(
            "Analytics credentials are not configured; set ANALYTICS_USERNAME and ANALYTICS_PASSWORD"
        );
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            data_dir: Some("data".into()),
            sites_file: Some("sites.toml".into()),
            job_timeout_secs: Some(30),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/sitereports"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/sitereports/data"));
        assert_eq!(
            settings.reports_dir,
            PathBuf::from("/etc/sitereports/data/reports")
        );
        assert_eq!(
            settings.sites_file,
            Some(PathBuf::from("/etc/sitereports/sites.toml"))
        );
        assert_eq!(settings.job_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_reports_dir_override_is_relative_to_data_dir() {
        let config = Config {
            data_dir: Some("/srv/app".into()),
            reports_dir: Some("public/reports".into()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/ignored"));
        assert_eq!(
            settings.reports_dir,
            PathBuf::from("/srv/app/public/reports")
        );
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let bulk = BulkConfig {
            default_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(bulk.validate(), Err(ConfigError::Invalid(_))));
        assert!(BulkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_job_timeout_is_rejected() {
        let config = Config {
            job_timeout_secs: Some(0),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/sitereports"));
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        assert!(Settings::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_rejects_zero_job_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sitereports.toml");
        std::fs::write(&path, "job_timeout_secs = 0\n").unwrap();

        let result = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            use_cwd: false,
        })
        .await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_load_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sitereports.toml");
        std::fs::write(
            &path,
            r#"
bind = "0.0.0.0:8080"

[bulk]
default_concurrency = 2

[analytics.wait]
page_ready_ms = 5000

[[sites]]
domainName = "example.com"
monthly = 1000
languages = ["EN"]
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(config.bulk.default_concurrency, 2);
        assert_eq!(config.bulk.max_concurrency, 16);
        assert_eq!(config.analytics.wait.page_ready_ms, 5000);
        assert_eq!(config.analytics.wait.poll_interval_ms, 250);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_load_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"reports_dir": "out", "job_timeout_secs": 90}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.reports_dir.as_deref(), Some("out"));
        assert_eq!(config.job_timeout_secs, Some(90));
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "bind: [unterminated").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "YAML", .. }));
    }
}
