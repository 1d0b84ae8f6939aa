use std::path::PathBuf;
use shared::types::RecordType;
use thiserror::Error;

/// Failure reading configuration text. Never escapes a reader; it is folded
/// into the returned view as a diagnostic.
#[derive(Debug, Error)]
#[error("Failed to read {}: {source}", .path.display())]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ReadError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::PermissionDenied
    }
}

/// Rejected input at the staging boundary; nothing reaches the log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid MAC address format: {0}")]
    InvalidMac(String),

    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Invalid record type: {0}")]
    InvalidRecordType(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid zone name: {0}")]
    InvalidZone(String),

    #[error("Value must be a single line")]
    MultiLine,

    #[error("Invalid record name: {0}")]
    InvalidRecordName(String),

    #[error("Invalid {0} record value: {1}")]
    InvalidRecordValue(RecordType, String),

    #[error("Invalid MX priority: {0}")]
    InvalidPriority(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid service action: {0}")]
    InvalidAction(String),
}

/// Failure committing one unit (the DHCP file, or one zone).
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("Failed to stage temporary file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("{} changed on disk while changes were being applied", .path.display())]
    ConcurrentModification { path: PathBuf },

    #[error("Zone file already exists: {}", .path.display())]
    ZoneExists { path: PathBuf },
}
