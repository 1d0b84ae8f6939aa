//! Read-only views over DHCP and DNS configuration text.
//!
//! Readers never fail: I/O errors become empty views carrying a diagnostic.

pub mod dhcp;
pub mod dns;
pub mod leases;
pub mod matchers;

use std::path::Path;
use crate::error::ReadError;

pub(crate) fn read_text(path: &Path) -> Result<String, ReadError> {
    std::fs::read_to_string(path).map_err(|e| ReadError::new(path, e))
}
