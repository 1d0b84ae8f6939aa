use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use chrono::Utc;
use shared::types::{HostRecord, Lease, Liveness, RecordType, Zone};

/// Last known reachability per address.
///
/// Written by the network scanner, read by the config views. Readers only
/// ever merge from it; they never change it.
#[derive(Debug, Clone, Default)]
pub struct LivenessCache {
    inner: Arc<RwLock<HashMap<String, Liveness>>>,
}

impl LivenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<Liveness> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .copied()
    }

    /// Write side for the external liveness scanner: record one reachability
    /// result for `address`, stamped now. The daemon itself never scans, so
    /// until a scanner holds a clone of this cache every annotation is absent.
    pub fn record(&self, address: impl Into<String>, online: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.into(), Liveness { online, checked: Utc::now() });
    }

    /// Addresses last seen online
    pub fn online_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|l| l.online)
            .count()
    }

    pub fn annotate_hosts(&self, hosts: &mut [HostRecord]) {
        for host in hosts {
            let Some(status) = host.address.as_deref().and_then(|a| self.get(a)) else {
                continue;
            };
            host.online = Some(status.online);
            host.last_check = Some(status.checked);
        }
    }

    /// Only A records carry an address worth probing
    pub fn annotate_zones(&self, zones: &mut [Zone]) {
        for record in zones
            .iter_mut()
            .flat_map(|z| z.records.iter_mut())
            .filter(|r| r.record_type == RecordType::A)
        {
            if let Some(status) = self.get(&record.value) {
                record.online = Some(status.online);
                record.last_check = Some(status.checked);
            }
        }
    }

    pub fn annotate_leases(&self, leases: &mut [Lease]) {
        for lease in leases {
            lease.online = self.get(&lease.ip).map(|s| s.online);
        }
    }
}
