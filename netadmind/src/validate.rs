//! Input checks applied before anything reaches the change log.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use regex::Regex;
use shared::types::RecordType;
use crate::error::ValidationError;

static MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-f]{2}:){5}[0-9a-f]{2}$").expect("valid regex"));

/// Trimmed value of a required field
pub fn required(value: Option<&str>) -> Result<&str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingFields),
    }
}

/// Lowercased, colon-separated MAC
pub fn normalize_mac(mac: &str) -> Result<String, ValidationError> {
    let mac = mac.trim().to_ascii_lowercase();
    if MAC.is_match(&mac) {
        Ok(mac)
    } else {
        Err(ValidationError::InvalidMac(mac))
    }
}

/// DHCP fixed addresses are IPv4 only
pub fn validate_ipv4(ip: &str) -> Result<String, ValidationError> {
    let ip = ip.trim();
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.to_string())
        .map_err(|_| ValidationError::InvalidIp(ip.to_string()))
}

pub fn parse_record_type(value: &str) -> Result<RecordType, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidRecordType(value.trim().to_string()))
}

/// A hostname must be one token that cannot close or open a block
pub fn validate_hostname(hostname: &str) -> Result<String, ValidationError> {
    let hostname = hostname.trim();
    let unsafe_char = |c: char| c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"' | '#');
    if hostname.is_empty() || hostname.chars().any(unsafe_char) {
        return Err(ValidationError::InvalidHostname(hostname.to_string()));
    }
    Ok(hostname.to_string())
}

/// Zone names become file names under the BIND directory
pub fn validate_zone_name(zone: &str) -> Result<String, ValidationError> {
    let zone = zone.trim();
    let bad = zone.is_empty()
        || zone.contains('/')
        || zone.contains('\\')
        || zone.contains("..")
        || zone.starts_with('.')
        || zone.chars().any(char::is_whitespace);
    if bad {
        return Err(ValidationError::InvalidZone(zone.to_string()));
    }
    Ok(zone.to_string())
}

/// Owner names are the first token of a record line
pub fn validate_record_name(name: &str) -> Result<String, ValidationError> {
    let name = single_line(name)?;
    let unsafe_char = |c: char| c.is_whitespace() || matches!(c, ';' | '"' | '(' | ')' | '$');
    if name.chars().any(unsafe_char) {
        return Err(ValidationError::InvalidRecordName(name.to_string()));
    }
    Ok(name.to_string())
}

/// Rdata for `record_type`, in the form it is stored in the log.
///
/// Addresses must parse for their family. TXT values lose one pair of
/// surrounding quotes and may not contain any other. Every other type is a
/// single token.
pub fn validate_record_value(record_type: RecordType, value: &str) -> Result<String, ValidationError> {
    let value = single_line(value)?;
    let invalid = || ValidationError::InvalidRecordValue(record_type, value.to_string());
    match record_type {
        RecordType::A => value.parse::<Ipv4Addr>().map(|a| a.to_string()).map_err(|_| invalid()),
        RecordType::Aaaa => value.parse::<Ipv6Addr>().map(|a| a.to_string()).map_err(|_| invalid()),
        RecordType::Txt => {
            let inner = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            if inner.is_empty() || inner.contains('"') {
                return Err(invalid());
            }
            Ok(inner.to_string())
        }
        _ => {
            if value.chars().any(|c| c.is_whitespace() || matches!(c, ';' | '"' | '(' | ')')) {
                return Err(invalid());
            }
            Ok(value.to_string())
        }
    }
}

/// MX preference, 0 to 65535
pub fn validate_priority(priority: &str) -> Result<String, ValidationError> {
    let priority = priority.trim();
    priority
        .parse::<u16>()
        .map(|p| p.to_string())
        .map_err(|_| ValidationError::InvalidPriority(priority.to_string()))
}

/// Record values and names are written as one line
pub fn single_line(value: &str) -> Result<&str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if value.contains(['\n', '\r']) {
        return Err(ValidationError::MultiLine);
    }
    Ok(value)
}
