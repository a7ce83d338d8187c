//! Domain name validation.
//!
//! Domain names are used verbatim as report file names, so anything that
//! could escape the reports directory is refused here.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Maximum length of a DNS name.
const MAX_DOMAIN_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid domain name: {0:?}")]
pub struct InvalidDomain(pub String);

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$")
            .expect("static domain regex is valid")
    })
}

/// Check that `name` is a plain domain name (labels of letters, digits and
/// hyphens separated by single dots).
pub fn validate_domain_name(name: &str) -> Result<&str, InvalidDomain> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_DOMAIN_LEN || !domain_pattern().is_match(trimmed)
    {
        return Err(InvalidDomain(name.to_string()));
    }
    Ok(trimmed)
}
