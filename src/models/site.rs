//! Site metadata as stored by the dashboard.

use serde::{Deserialize, Serialize};

use super::job::{DownloadJob, DEFAULT_LANGUAGE};

/// A tracked site, as far as report downloads are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    #[serde(alias = "domain_name", alias = "domain")]
    pub domain_name: String,
    /// Monthly visitor threshold used when exporting.
    #[serde(default)]
    pub monthly: u64,
    /// Language names in display order; the first one drives the export.
    #[serde(default)]
    pub languages: Vec<String>,
}

impl SiteRecord {
    pub fn new(domain_name: impl Into<String>, monthly: u64, languages: Vec<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            monthly,
            languages,
        }
    }

    /// Lowercased first language, or `en`.
    pub fn report_language(&self) -> String {
        self.languages
            .first()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    pub fn to_job(&self) -> DownloadJob {
        DownloadJob::new(
            self.domain_name.clone(),
            Some(&self.report_language()),
            self.monthly,
        )
    }
}
