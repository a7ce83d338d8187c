//! Bulk download request bodies.
//!
//! Shape: `{"sites": [{"domainName", "language", "monthlyVisitors"}], "concurrency": n}`.
//! Parsing is done by hand from a JSON value so every malformed body maps
//! to one of the [`BulkRequestError`] messages instead of a generic
//! extractor rejection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::BulkConfig;
use crate::models::DownloadJob;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BulkRequestError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Invalid sites data: Empty or not an array")]
    EmptySites,
    #[error("Invalid sites data: site {index}: {message}")]
    InvalidSite { index: usize, message: String },
    #[error("Invalid concurrency: {0} (must be a positive integer)")]
    InvalidConcurrency(String),
}

/// One entry of the `sites` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSite {
    pub domain_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub monthly_visitors: u64,
}

impl BulkSite {
    pub fn to_job(&self) -> DownloadJob {
        DownloadJob::new(
            self.domain_name.clone(),
            self.language.as_deref(),
            self.monthly_visitors,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub sites: Vec<BulkSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// A validated request: jobs in queue order and the concurrency to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPlan {
    pub jobs: Vec<DownloadJob>,
    pub concurrency: usize,
}

impl BulkRequest {
    /// Parse and validate a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, BulkRequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| BulkRequestError::InvalidBody(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, BulkRequestError> {
        let Value::Object(mut body) = value else {
            return Err(BulkRequestError::InvalidBody(
                "expected a JSON object".to_string(),
            ));
        };

        let sites = match body.remove("sites") {
            Some(Value::Array(sites)) if !sites.is_empty() => sites,
            _ => return Err(BulkRequestError::EmptySites),
        };

        let sites = sites
            .into_iter()
            .enumerate()
            .map(|(index, site)| {
                let site: BulkSite =
                    serde_json::from_value(site).map_err(|e| BulkRequestError::InvalidSite {
                        index,
                        message: e.to_string(),
                    })?;
                if site.domain_name.trim().is_empty() {
                    return Err(BulkRequestError::InvalidSite {
                        index,
                        message: "domainName is empty".to_string(),
                    });
                }
                Ok(site)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let concurrency = match body.remove("concurrency") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(c) if c >= 1 => Some(c as usize),
                _ => return Err(BulkRequestError::InvalidConcurrency(n.to_string())),
            },
            Some(other) => return Err(BulkRequestError::InvalidConcurrency(other.to_string())),
        };

        Ok(Self { sites, concurrency })
    }

    /// Resolve against configured limits.
    ///
    /// Missing concurrency takes the configured default; anything above the
    /// configured maximum is clamped down to it.
    pub fn plan(&self, limits: &BulkConfig) -> BulkPlan {
        let requested = self.concurrency.unwrap_or(limits.default_concurrency);
        let concurrency = if requested > limits.max_concurrency {
            warn!(
                "Requested concurrency {} exceeds the limit; using {}",
                requested, limits.max_concurrency
            );
            limits.max_concurrency
        } else {
            requested
        };

        BulkPlan {
            jobs: self.sites.iter().map(BulkSite::to_job).collect(),
            concurrency: concurrency.max(1),
        }
    }
}
