/// Prefix every BIND zone file carries, e.g. "db.example.com"
pub const ZONE_FILE_PREFIX: &str = "db.";

/// Suffix of BIND dynamic-update journals, never treated as zones
pub const JOURNAL_SUFFIX: &str = ".jnl";

/// Zone files shipped by default installations; not user-managed
pub const STOCK_ZONE_FILES: &[&str] = &["db.0", "db.127", "db.255", "db.empty", "db.local", "db.root"];

/// Marker following the SOA serial number in a zone file
pub const SERIAL_MARKER: &str = "; Serial";

/// Label that identifies an IPv4 reverse zone
pub const REVERSE_ZONE_SUFFIX: &str = "in-addr.arpa";

/// API path prefix
pub const API_PREFIX: &str = "/api";
