//! Structured fetch failures.
//!
//! Errors carry the domain, the step that failed, and the underlying cause.
//! They are rendered to text only where they meet the progress stream.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;

use super::session::SessionError;
use crate::storage::ReportStoreError;

/// Step of the export flow a job was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Prepare,
    Launch,
    Login,
    Query,
    Export,
    Download,
    Save,
}

impl FetchPhase {
    const ALL: [FetchPhase; 7] = [
        FetchPhase::Prepare,
        FetchPhase::Launch,
        FetchPhase::Login,
        FetchPhase::Query,
        FetchPhase::Export,
        FetchPhase::Download,
        FetchPhase::Save,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPhase::Prepare => "preparing job",
            FetchPhase::Launch => "launching browser",
            FetchPhase::Login => "logging in",
            FetchPhase::Query => "opening report page",
            FetchPhase::Export => "exporting report",
            FetchPhase::Download => "downloading report",
            FetchPhase::Save => "saving report",
        }
    }

    fn index(self) -> u8 {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0) as u8
    }

    fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(FetchPhase::Prepare)
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a phase.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("analytics credentials are not configured")]
    MissingCredentials,
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] ReportStoreError),
}

/// A failed report download.
#[derive(Debug, Error)]
#[error("{phase}: {cause}")]
pub struct FetchError {
    pub domain: String,
    pub phase: FetchPhase,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(domain: impl Into<String>, phase: FetchPhase, cause: impl Into<FetchCause>) -> Self {
        Self {
            domain: domain.into(),
            phase,
            cause: cause.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FetchCause::Timeout(_))
    }
}

/// Last phase a running job entered, readable after the job is cancelled.
#[derive(Debug, Default)]
pub(crate) struct PhaseTracker(AtomicU8);

impl PhaseTracker {
    pub(crate) fn enter(&self, phase: FetchPhase) {
        self.0.store(phase.index(), Ordering::Relaxed);
    }

    pub(crate) fn current(&self) -> FetchPhase {
        FetchPhase::from_index(self.0.load(Ordering::Relaxed))
    }
}
