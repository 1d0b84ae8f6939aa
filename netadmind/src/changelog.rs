use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use serde::Serialize;
use shared::types::{ChangeAction, DhcpChange, DnsChange, PendingChange};

/// A change as held by the log, tagged with its staging sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Staged<T> {
    pub seq: u64,
    #[serde(flatten)]
    pub change: T,
}

/// Receipt for a staged change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub seq: u64,
}

/// Human-readable one-liners, one per pending change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub dhcp: Vec<String>,
    pub dns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    pub dhcp: Vec<Staged<DhcpChange>>,
    pub dns: Vec<Staged<DnsChange>>,
    pub total: usize,
}

#[derive(Debug, Default)]
struct Families {
    dhcp: Vec<Staged<DhcpChange>>,
    dns: Vec<Staged<DnsChange>>,
    next_seq: u64,
}

/// Staging area for pending DHCP and DNS changes.
///
/// One lock guards both families, so every operation observes and leaves a
/// consistent log. Entries are only removed by [`ChangeLog::discard`], by
/// DHCP supersession, or by the apply engine once a unit has been committed.
#[derive(Debug, Default)]
pub struct ChangeLog {
    inner: Mutex<Families>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Families> {
        // no mutation panics midway, so a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a change to its family.
    ///
    /// A DHCP `edit` or `delete` first evicts every pending change for the
    /// same hostname, so the newest intent is the only one left. A DHCP `add`
    /// evicts nothing. DNS changes always accumulate.
    pub fn stage(&self, change: impl Into<PendingChange>) -> Accepted {
        let mut families = self.lock();
        let seq = families.next_seq;
        families.next_seq += 1;

        match change.into() {
            PendingChange::Dhcp(change) => {
                if change.action != ChangeAction::Add {
                    let before = families.dhcp.len();
                    families
                        .dhcp
                        .retain(|s| !s.change.hostname.eq_ignore_ascii_case(&change.hostname));
                    let evicted = before - families.dhcp.len();
                    if evicted > 0 {
                        tracing::debug!(
                            "Superseded {} pending change(s) for host {}",
                            evicted,
                            change.hostname
                        );
                    }
                }
                tracing::info!("Staged DHCP {:?} for host {}", change.action, change.hostname);
                families.dhcp.push(Staged { seq, change });
            }
            PendingChange::Dns(change) => {
                tracing::info!(
                    "Staged DNS {:?} for {} {} in zone {}",
                    change.action,
                    change.record.record_type,
                    change.record.name,
                    change.zone
                );
                families.dns.push(Staged { seq, change });
            }
        }

        Accepted { seq }
    }

    /// Copy out the pending DHCP changes in staging order.
    ///
    /// The log keeps them until [`ChangeLog::clear_applied_dhcp`] is called
    /// with their sequence numbers.
    pub fn drain_dhcp(&self) -> Vec<Staged<DhcpChange>> {
        self.lock().dhcp.clone()
    }

    /// Copy out the pending DNS changes in staging order
    pub fn drain_dns(&self) -> Vec<Staged<DnsChange>> {
        self.lock().dns.clone()
    }

    /// Remove DHCP entries that were committed. Returns how many were removed.
    pub fn clear_applied_dhcp(&self, seqs: &[u64]) -> usize {
        let applied: HashSet<u64> = seqs.iter().copied().collect();
        let mut families = self.lock();
        let before = families.dhcp.len();
        families.dhcp.retain(|s| !applied.contains(&s.seq));
        before - families.dhcp.len()
    }

    /// Remove DNS entries that were committed. Returns how many were removed.
    pub fn clear_applied_dns(&self, seqs: &[u64]) -> usize {
        let applied: HashSet<u64> = seqs.iter().copied().collect();
        let mut families = self.lock();
        let before = families.dns.len();
        families.dns.retain(|s| !applied.contains(&s.seq));
        before - families.dns.len()
    }

    /// Drop every pending change in both families
    pub fn discard(&self) -> usize {
        let mut families = self.lock();
        let count = families.dhcp.len() + families.dns.len();
        families.dhcp.clear();
        families.dns.clear();
        tracing::info!("Discarded {} pending change(s)", count);
        count
    }

    pub fn preview(&self) -> Preview {
        let families = self.lock();
        Preview {
            dhcp: families.dhcp.iter().map(|s| describe_dhcp(&s.change)).collect(),
            dns: families.dns.iter().map(|s| describe_dns(&s.change)).collect(),
        }
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        let families = self.lock();
        PendingSnapshot {
            dhcp: families.dhcp.clone(),
            dns: families.dns.clone(),
            total: families.dhcp.len() + families.dns.len(),
        }
    }

    pub fn dhcp_len(&self) -> usize {
        self.lock().dhcp.len()
    }

    pub fn dns_len(&self) -> usize {
        self.lock().dns.len()
    }
}

fn describe_dhcp(change: &DhcpChange) -> String {
    let mac = change.data.mac.as_deref().unwrap_or("unchanged");
    let ip = change.data.ip.as_deref().unwrap_or("unchanged");
    match change.action {
        ChangeAction::Add => format!("+ Add host '{}': MAC={}, IP={}", change.hostname, mac, ip),
        ChangeAction::Edit => format!("~ Edit host '{}': MAC={}, IP={}", change.hostname, mac, ip),
        ChangeAction::Delete => format!("- Delete host '{}'", change.hostname),
    }
}

fn describe_dns(change: &DnsChange) -> String {
    let record = &change.record;
    let value = match (&record.priority, &record.value) {
        (Some(priority), Some(value)) => format!("{} {}", priority, value),
        (None, Some(value)) => value.clone(),
        (_, None) => String::new(),
    };
    match change.action {
        ChangeAction::Add => format!(
            "+ Add {} record '{}' = {} in zone '{}'",
            record.record_type, record.name, value, change.zone
        ),
        ChangeAction::Edit => format!(
            "~ Edit {} record '{}' = {} in zone '{}'",
            record.record_type, record.name, value, change.zone
        ),
        ChangeAction::Delete => format!(
            "- Delete {} record '{}' from zone '{}'",
            record.record_type, record.name, change.zone
        ),
    }
}
