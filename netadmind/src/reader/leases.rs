use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use chrono::NaiveDateTime;
use shared::types::{HostKind, Lease, LeaseHistoryPoint};
use super::matchers;

/// Hours of lease activity kept in the history view
pub const HISTORY_HOURS: usize = 48;

pub fn parse_leases(text: &str) -> Vec<Lease> {
    matchers::lease_blocks(text)
        .into_iter()
        .map(|block| Lease {
            ip: block.ip.to_string(),
            kind: HostKind::Dynamic,
            mac: matchers::hardware_ethernet(block.body).map(str::to_ascii_lowercase),
            hostname: matchers::client_hostname(block.body).map(str::to_string),
            starts: matchers::lease_starts(block.body).map(str::to_string),
            ends: matchers::lease_ends(block.body).map(str::to_string),
            state: matchers::binding_state(block.body).map(str::to_string),
            online: None,
        })
        .collect()
}

/// Read the leases database; an unreadable file yields no leases
pub fn read_leases(path: &Path) -> Vec<Lease> {
    match super::read_text(path) {
        Ok(text) => parse_leases(&text),
        Err(e) => {
            tracing::warn!("{}", e);
            Vec::new()
        }
    }
}

/// Hourly lease activity, oldest first, limited to the latest
/// `HISTORY_HOURS` hours that saw any lease start
pub fn lease_history(leases: &[Lease]) -> Vec<LeaseHistoryPoint> {
    let mut hours: BTreeMap<String, (usize, BTreeSet<&str>)> = BTreeMap::new();
    for lease in leases {
        let Some(starts) = lease.starts.as_deref() else {
            continue;
        };
        let Ok(started) = NaiveDateTime::parse_from_str(starts, "%Y/%m/%d %H:%M:%S") else {
            tracing::debug!("Unparseable lease start: {}", starts);
            continue;
        };
        let bucket = hours
            .entry(started.format("%Y-%m-%dT%H:00:00").to_string())
            .or_default();
        bucket.0 += 1;
        if let Some(mac) = lease.mac.as_deref() {
            bucket.1.insert(mac);
        }
    }

    let skip = hours.len().saturating_sub(HISTORY_HOURS);
    hours
        .into_iter()
        .skip(skip)
        .map(|(timestamp, (requests, macs))| LeaseHistoryPoint {
            timestamp,
            requests,
            unique_hosts: macs.len(),
        })
        .collect()
}
