//! Site directory implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::SiteRecord;

#[derive(Debug, Error)]
pub enum SiteDirectoryError {
    #[error("Failed to read sites file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse sites file '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Lookup of stored site metadata by domain.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>, SiteDirectoryError>;
}

/// Sites held in memory, keyed by lowercased domain.
#[derive(Debug, Default, Clone)]
pub struct MemorySiteDirectory {
    sites: HashMap<String, SiteRecord>,
}

impl MemorySiteDirectory {
    pub fn new(sites: impl IntoIterator<Item = SiteRecord>) -> Self {
        Self {
            sites: sites
                .into_iter()
                .map(|site| (site.domain_name.to_lowercase(), site))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[async_trait]
impl SiteDirectory for MemorySiteDirectory {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>, SiteDirectoryError> {
        Ok(self.sites.get(&domain.trim().to_lowercase()).cloned())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SitesFile {
    Wrapped { sites: Vec<SiteRecord> },
    List(Vec<SiteRecord>),
}

impl SitesFile {
    fn into_sites(self) -> Vec<SiteRecord> {
        match self {
            SitesFile::Wrapped { sites } | SitesFile::List(sites) => sites,
        }
    }
}

/// Sites read from a TOML, YAML or JSON file.
///
/// The file is re-read on every lookup so edits show up without a restart.
/// Either a top-level `sites` list or (JSON/YAML) a bare list is accepted.
#[derive(Debug, Clone)]
pub struct FileSiteDirectory {
    path: PathBuf,
}

impl FileSiteDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every site in the file.
    pub async fn load(&self) -> Result<Vec<SiteRecord>, SiteDirectoryError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SiteDirectoryError::Read {
                path: self.path.clone(),
                source,
            })?;
        parse_sites(&self.path, &contents)
    }
}

fn parse_sites(path: &Path, contents: &str) -> Result<Vec<SiteRecord>, SiteDirectoryError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let parse_error = |message: String| SiteDirectoryError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file: SitesFile = match ext {
        "toml" => toml::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        _ => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
    };
    Ok(file.into_sites())
}

#[async_trait]
impl SiteDirectory for FileSiteDirectory {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>, SiteDirectoryError> {
        let wanted = domain.trim().to_lowercase();
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|site| site.domain_name.to_lowercase() == wanted))
    }
}
