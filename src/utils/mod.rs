//! Shared utility functions.
//!
//! - `domain`: domain name validation before a name becomes a file name
//! - `month`: report month tags (`YYYYMM`)

mod domain;
mod month;

pub use domain::{validate_domain_name, InvalidDomain};
pub use month::{month_tag, previous_month_tag, previous_month_tag_now};
