//! Download jobs and their results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Language used when a site has none configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// One report download for one domain.
///
/// Jobs are not persisted. They live from the moment a request names the
/// domain until the fetch settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub domain_name: String,
    /// Two-letter analytics database code, lowercase.
    pub language: String,
    /// Only pages above this monthly traffic are exported.
    pub monthly_visitor_threshold: u64,
}

impl DownloadJob {
    pub fn new(
        domain_name: impl Into<String>,
        language: Option<&str>,
        monthly_visitor_threshold: u64,
    ) -> Self {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Self {
            domain_name: domain_name.into(),
            language,
            monthly_visitor_threshold,
        }
    }
}

/// Outcome of one job, collected by the bulk scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Completed {
        domain_name: String,
        file_path: PathBuf,
    },
    Failed {
        domain_name: String,
        error: String,
    },
}

impl JobResult {
    pub fn domain_name(&self) -> &str {
        match self {
            JobResult::Completed { domain_name, .. } | JobResult::Failed { domain_name, .. } => {
                domain_name
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Completed { .. })
    }

    /// The summary line written to the progress stream for this result.
    pub fn summary_line(&self) -> String {
        match self {
            JobResult::Completed {
                domain_name,
                file_path,
            } => format!(
                "Completed download for {}: {}",
                domain_name,
                file_path.display()
            ),
            JobResult::Failed { domain_name, error } => {
                format!("Error processing {}: {}", domain_name, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_defaults_to_en() {
        assert_eq!(DownloadJob::new("a.com", None, 10).language, "en");
        assert_eq!(DownloadJob::new("a.com", Some("  "), 10).language, "en");
    }

    #[test]
    fn test_language_is_lowercased() {
        assert_eq!(DownloadJob::new("a.com", Some("DE"), 10).language, "de");
    }

    #[test]
    fn test_summary_lines() {
        let ok = JobResult::Completed {
            domain_name: "a.com".into(),
            file_path: PathBuf::from("reports/a.com.xlsx"),
        };
        assert_eq!(
            ok.summary_line(),
            "Completed download for a.com: reports/a.com.xlsx"
        );
        assert!(ok.is_success());

        let failed = JobResult::Failed {
            domain_name: "b.com".into(),
            error: "login: bad password".into(),
        };
        assert_eq!(
            failed.summary_line(),
            "Error processing b.com: login: bad password"
        );
        assert_eq!(failed.domain_name(), "b.com");
    }
}
