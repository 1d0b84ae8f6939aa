use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use shared::types::{DhcpConfig, HostKind, HostRecord, Subnet};
use super::matchers;

/// Build the structured view of a `dhcpd.conf`.
///
/// Host blocks without a `hardware ethernet` line cannot be represented as a
/// static host and are dropped. Hosts come back sorted case-insensitively and
/// unique by name; the first declaration of a name wins.
pub fn parse_dhcp_config(text: &str) -> DhcpConfig {
    let options = matchers::top_level_options(text)
        .into_iter()
        .map(|opt| (opt.name.to_string(), opt.value.to_string()))
        .collect();

    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for block in matchers::host_blocks(text) {
        let Some(mac) = matchers::hardware_ethernet(block.body) else {
            tracing::debug!("Skipping host {} - no hardware ethernet", block.name);
            continue;
        };
        if !seen.insert(block.name.to_ascii_lowercase()) {
            tracing::warn!("Duplicate host declaration {} ignored", block.name);
            continue;
        }
        hosts.push(HostRecord {
            name: block.name.to_string(),
            mac: mac.to_ascii_lowercase(),
            address: matchers::fixed_address(block.body).map(str::to_string),
            kind: HostKind::Static,
            online: None,
            last_check: None,
        });
    }
    hosts.sort_by_key(|h| h.name.to_lowercase());

    let subnets = matchers::subnet_blocks(text)
        .into_iter()
        .map(|block| {
            let range = matchers::range(block.body);
            Subnet {
                network: block.network.to_string(),
                netmask: block.netmask.to_string(),
                range_start: range.map(|(start, _)| start.to_string()),
                range_end: range.map(|(_, end)| end.to_string()),
                options: matchers::block_options(block.body)
                    .into_iter()
                    .map(|opt| (opt.name.to_string(), opt.value.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            }
        })
        .collect();

    DhcpConfig {
        hosts,
        options,
        subnets,
        raw: text.to_string(),
        error: None,
    }
}

/// Read and parse the DHCP configuration at `path`
pub fn read_dhcp_config(path: &Path) -> DhcpConfig {
    match super::read_text(path) {
        Ok(text) => parse_dhcp_config(&text),
        Err(e) => {
            tracing::warn!("{}", e);
            DhcpConfig::unreadable(e.to_string())
        }
    }
}
