//! Storage helpers for downloaded reports on disk.
//!
//! Every domain owns exactly one report file, `{reports_dir}/{domain}.xlsx`.
//! A new download replaces the old file by deleting it first and then
//! moving the new one into place.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::{validate_domain_name, InvalidDomain};

/// Extension used for stored reports.
pub const REPORT_EXTENSION: &str = "xlsx";

#[derive(Debug, Error)]
pub enum ReportStoreError {
    #[error(transparent)]
    InvalidDomain(#[from] InvalidDomain),
    #[error("Failed to create reports directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to delete '{path}': {source}")]
    Delete { path: PathBuf, source: io::Error },
    #[error("Failed to save report to '{path}': {source}")]
    Save { path: PathBuf, source: io::Error },
    #[error("Failed to check '{path}': {source}")]
    Check { path: PathBuf, source: io::Error },
    #[error("Report not found: {0}")]
    NotFound(PathBuf),
}

/// Flat directory of per-domain report files.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination path for a domain's report.
    pub fn path_for(&self, domain: &str) -> Result<PathBuf, ReportStoreError> {
        let domain = validate_domain_name(domain)?;
        Ok(self
            .dir
            .join(format!("{}.{}", domain, REPORT_EXTENSION)))
    }

    /// Create the reports directory if needed. Idempotent.
    pub async fn ensure_dir(&self) -> Result<(), ReportStoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportStoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    /// Whether a report exists for `domain`.
    pub async fn exists(&self, domain: &str) -> Result<bool, ReportStoreError> {
        let path = self.path_for(domain)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| ReportStoreError::Check { path, source })
    }

    /// Delete the report for `domain` if there is one.
    ///
    /// Returns `true` when a file was actually removed.
    pub async fn remove_existing(&self, domain: &str) -> Result<bool, ReportStoreError> {
        let path = self.path_for(domain)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted existing report {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ReportStoreError::Delete { path, source }),
        }
    }

    /// Delete the report for `domain`, failing if there is none.
    pub async fn delete(&self, domain: &str) -> Result<PathBuf, ReportStoreError> {
        let path = self.path_for(domain)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ReportStoreError::NotFound(path)),
            Err(source) => Err(ReportStoreError::Delete { path, source }),
        }
    }

    /// Move a downloaded file into place as the report for `domain`.
    ///
    /// The caller is expected to have removed any previous report already.
    /// Falls back to copy-and-delete when the download lives on another
    /// filesystem.
    pub async fn persist(&self, domain: &str, downloaded: &Path) -> Result<PathBuf, ReportStoreError> {
        let path = self.path_for(domain)?;

        if tokio::fs::rename(downloaded, &path).await.is_err() {
            tokio::fs::copy(downloaded, &path)
                .await
                .map_err(|source| ReportStoreError::Save {
                    path: path.clone(),
                    source,
                })?;
            if let Err(e) = tokio::fs::remove_file(downloaded).await {
                warn!(
                    "Could not remove staged download {}: {}",
                    downloaded.display(),
                    e
                );
            }
        }

        if let Some(kind) = sniff_kind(&path) {
            if kind != XLSX_MIME {
                warn!(
                    "Report for {} does not look like a spreadsheet (detected {})",
                    domain, kind
                );
            }
        }

        Ok(path)
    }
}

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn sniff_kind(path: &Path) -> Option<&'static str> {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_for_domain() {
        let store = ReportStore::new("/data/reports");
        assert_eq!(
            store.path_for("example.com").unwrap(),
            PathBuf::from("/data/reports/example.com.xlsx")
        );
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let store = ReportStore::new("/data/reports");
        assert!(matches!(
            store.path_for("../secrets"),
            Err(ReportStoreError::InvalidDomain(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("nested/reports"));
        store.ensure_dir().await.unwrap();
        store.ensure_dir().await.unwrap();
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_remove_existing_reports_whether_deleted() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        assert!(!store.remove_existing("a.com").await.unwrap());

        std::fs::write(dir.path().join("a.com.xlsx"), b"old").unwrap();
        assert!(store.exists("a.com").await.unwrap());
        assert!(store.remove_existing("a.com").await.unwrap());
        assert!(!store.exists("a.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_persist_moves_file() {
        let dir = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let store = ReportStore::new(dir.path());

        let staged = staging.path().join("download-guid");
        std::fs::write(&staged, b"report bytes").unwrap();

        let path = store.persist("a.com", &staged).await.unwrap();
        assert_eq!(path, dir.path().join("a.com.xlsx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"report bytes");
        assert!(!staged.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exists_surfaces_io_errors() {
        let dir = tempdir().unwrap();
        // A regular file where the reports directory should be makes the
        // lookup fail with ENOTDIR instead of reporting "missing".
        let not_a_dir = dir.path().join("reports");
        std::fs::write(&not_a_dir, b"").unwrap();
        let store = ReportStore::new(&not_a_dir);

        assert!(matches!(
            store.exists("a.com").await,
            Err(ReportStoreError::Check { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        assert!(matches!(
            store.delete("missing.com").await,
            Err(ReportStoreError::NotFound(_))
        ));
    }
}
