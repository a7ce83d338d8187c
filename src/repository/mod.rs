//! Site directory: where single-domain downloads look up site metadata.
//!
//! The dashboard's own database is not part of this crate; sites come from
//! the config file or a standalone sites file.

mod sites;

pub use sites::{FileSiteDirectory, MemorySiteDirectory, SiteDirectory, SiteDirectoryError};
