use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A static DHCP host declaration as rendered from `dhcpd.conf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host declaration name, unique case-insensitively
    pub name: String,

    /// Lowercase colon-separated MAC, e.g. "aa:bb:cc:dd:ee:ff"
    pub mac: String,

    /// Fixed IPv4 address, absent when the block has no `fixed-address`
    pub address: Option<String>,

    #[serde(rename = "type")]
    pub kind: HostKind,

    /// Liveness annotation merged from the scanner cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Static,
    Dynamic,
}

/// A `subnet ... netmask ... { }` declaration. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub network: String,
    pub netmask: String,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub options: BTreeMap<String, String>,
}

/// Structured view of a DHCP configuration file.
///
/// When the file could not be read, every collection is empty and `error`
/// carries the diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpConfig {
    pub hosts: Vec<HostRecord>,
    pub options: BTreeMap<String, String>,
    pub subnets: Vec<Subnet>,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DhcpConfig {
    /// Empty view carrying a read diagnostic
    pub fn unreadable(diagnostic: impl Into<String>) -> Self {
        Self {
            error: Some(diagnostic.into()),
            ..Self::default()
        }
    }
}

/// DNS record types the zone reader and writer understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "PTR")]
    Ptr,
    #[serde(rename = "MX")]
    Mx,
    #[serde(rename = "TXT")]
    Txt,
    #[serde(rename = "NS")]
    Ns,
}

impl RecordType {
    /// Extraction order used when reading a zone file
    pub const ALL: [RecordType; 7] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Ptr,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Ns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Ptr => "PTR",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecordType(pub String);

impl fmt::Display for UnknownRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown record type: {}", self.0)
    }
}

impl std::error::Error for UnknownRecordType {}

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

/// A single resource record from a zone file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub name: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    pub value: String,

    /// MX preference, kept as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// One zone file under the BIND directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub file: String,
    pub is_reverse: bool,
    pub records: Vec<ZoneRecord>,
    pub record_count: usize,

    /// Set when the file could not be read; `records` is then empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All zones under the BIND directory.
///
/// `error` is set only when the directory itself could not be listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneListing {
    pub zones: Vec<Zone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A dynamic binding from the DHCP leases database. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub ip: String,
    #[serde(rename = "type")]
    pub kind: HostKind,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub starts: Option<String>,
    pub ends: Option<String>,
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

/// Lease activity within one hour, keyed by the lease start time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseHistoryPoint {
    /// Start of the hour, `YYYY-MM-DDTHH:00:00`
    pub timestamp: String,
    /// Leases that started in this hour
    pub requests: usize,
    /// Distinct MACs among them
    pub unique_hosts: usize,
}

/// Dashboard counters across both families
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub static_hosts: usize,
    /// Leases in binding state `active`
    pub active_leases: usize,
    pub dns_zones: usize,
    pub dns_records: usize,
    /// Addresses the liveness cache last saw online
    pub online_hosts: usize,
    pub pending_changes: usize,
}

/// Reachability of one address, as last observed by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub online: bool,
    pub checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Edit,
    Delete,
}

/// Field values carried by a staged DHCP host change.
///
/// For `edit` either field may be absent, meaning "leave as is".
/// For `delete` both are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPayload {
    pub mac: Option<String>,
    pub ip: Option<String>,
}

/// A staged change to a DHCP host, keyed by hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpChange {
    pub action: ChangeAction,
    pub hostname: String,
    pub data: HostPayload,
    pub timestamp: DateTime<Utc>,
}

impl DhcpChange {
    pub fn add(hostname: impl Into<String>, mac: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Add,
            hostname: hostname.into(),
            data: HostPayload {
                mac: Some(mac.into()),
                ip: Some(ip.into()),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn edit(hostname: impl Into<String>, mac: Option<String>, ip: Option<String>) -> Self {
        Self {
            action: ChangeAction::Edit,
            hostname: hostname.into(),
            data: HostPayload { mac, ip },
            timestamp: Utc::now(),
        }
    }

    pub fn delete(hostname: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            hostname: hostname.into(),
            data: HostPayload::default(),
            timestamp: Utc::now(),
        }
    }
}

/// Record identity plus new values for a staged DNS change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Absent for `delete`
    pub value: Option<String>,
    /// MX preference for `add`/`edit` of MX records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// A staged change to a record inside one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsChange {
    pub action: ChangeAction,
    pub zone: String,
    pub record: RecordPayload,
    pub timestamp: DateTime<Utc>,
}

impl DnsChange {
    pub fn add(
        zone: impl Into<String>,
        name: impl Into<String>,
        record_type: RecordType,
        value: impl Into<String>,
    ) -> Self {
        Self::with_value(ChangeAction::Add, zone.into(), name.into(), record_type, value.into())
    }

    pub fn edit(
        zone: impl Into<String>,
        name: impl Into<String>,
        record_type: RecordType,
        value: impl Into<String>,
    ) -> Self {
        Self::with_value(ChangeAction::Edit, zone.into(), name.into(), record_type, value.into())
    }

    pub fn delete(zone: impl Into<String>, name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            action: ChangeAction::Delete,
            zone: zone.into(),
            record: RecordPayload {
                name: name.into(),
                record_type,
                value: None,
                priority: None,
            },
            timestamp: Utc::now(),
        }
    }

    /// Attach an MX preference to an add/edit
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.record.priority = Some(priority.into());
        self
    }

    fn with_value(
        action: ChangeAction,
        zone: String,
        name: String,
        record_type: RecordType,
        value: String,
    ) -> Self {
        Self {
            action,
            zone,
            record: RecordPayload {
                name,
                record_type,
                value: Some(value),
                priority: None,
            },
            timestamp: Utc::now(),
        }
    }
}

/// A change waiting in the log, tagged by the configuration family it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum PendingChange {
    Dhcp(DhcpChange),
    Dns(DnsChange),
}

impl From<DhcpChange> for PendingChange {
    fn from(change: DhcpChange) -> Self {
        PendingChange::Dhcp(change)
    }
}

impl From<DnsChange> for PendingChange {
    fn from(change: DnsChange) -> Self {
        PendingChange::Dns(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Uniform response envelope for every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            data: None,
        }
    }

    /// Error that still carries the details of what was attempted
    pub fn error_with(message: impl Into<String>, data: T) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            data: Some(data),
        }
    }
}
