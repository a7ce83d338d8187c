//! Data models for report downloads.

mod job;
mod site;

pub use job::{DownloadJob, JobResult, DEFAULT_LANGUAGE};
pub use site::SiteRecord;
