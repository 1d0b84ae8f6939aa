use std::ops::Range;
use shared::types::{ChangeAction, DhcpChange, HostPayload};
use crate::reader::matchers::{self, HostBlock};

/// Text after a fold, plus how many edits or deletes named no host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folded {
    pub text: String,
    pub unmatched: usize,
}

/// Replay `changes` against `text` in order
pub fn fold_changes<'a>(text: &str, changes: impl IntoIterator<Item = &'a DhcpChange>) -> Folded {
    let start = Folded {
        text: text.to_string(),
        unmatched: 0,
    };
    changes.into_iter().fold(start, |mut acc, change| {
        match try_apply(&acc.text, change) {
            Some(text) => acc.text = text,
            None => acc.unmatched += 1,
        }
        acc
    })
}

/// Apply one change; one that matches no host leaves the text as is
pub fn apply_change(text: &str, change: &DhcpChange) -> String {
    try_apply(text, change).unwrap_or_else(|| text.to_string())
}

fn try_apply(text: &str, change: &DhcpChange) -> Option<String> {
    match change.action {
        ChangeAction::Delete => remove_host(text, &change.hostname),
        ChangeAction::Edit => edit_host(text, &change.hostname, &change.data),
        ChangeAction::Add => Some(append_host(text, &change.hostname, &change.data)),
    }
}

fn blocks_named<'a>(text: &'a str, hostname: &str) -> Vec<HostBlock<'a>> {
    matchers::host_blocks(text)
        .into_iter()
        .filter(|b| b.name.eq_ignore_ascii_case(hostname))
        .collect()
}

/// Cut every `host <hostname> { ... }` block along with the whitespace that
/// follows it
fn remove_host(text: &str, hostname: &str) -> Option<String> {
    let blocks = blocks_named(text, hostname);
    if blocks.is_empty() {
        tracing::warn!("Delete: no host block named {}", hostname);
        return None;
    }

    let cuts: Vec<Range<usize>> = blocks
        .iter()
        .map(|b| {
            let trailing = text[b.span.end..].len() - text[b.span.end..].trim_start().len();
            b.span.start..b.span.end + trailing
        })
        .collect();
    Some(splice(text, cuts.into_iter().map(|cut| (cut, String::new()))))
}

/// Replace or append the statements present in `data` inside each matching
/// block. Everything else in the block is kept.
fn edit_host(text: &str, hostname: &str, data: &HostPayload) -> Option<String> {
    let blocks = blocks_named(text, hostname);
    if blocks.is_empty() {
        tracing::warn!("Edit: no host block named {}", hostname);
        return None;
    }

    let edits = blocks.iter().map(|block| {
        let mut body = block.body.to_string();
        if let Some(mac) = &data.mac {
            let span = matchers::hardware_ethernet_span(&body);
            body = upsert_statement(&body, span, &format!("hardware ethernet {};", mac));
        }
        if let Some(ip) = &data.ip {
            let span = matchers::fixed_address_span(&body);
            body = upsert_statement(&body, span, &format!("fixed-address {};", ip));
        }
        (block.body_span.clone(), body)
    });
    Some(splice(text, edits))
}

fn upsert_statement(body: &str, existing: Option<Range<usize>>, statement: &str) -> String {
    match existing {
        Some(span) => format!("{}{}{}", &body[..span.start], statement, &body[span.end..]),
        None => {
            let content = body.trim_end();
            let tail = &body[content.len()..];
            let tail = if tail.contains('\n') { tail } else { "\n" };
            format!("{}\n    {}{}", content, statement, tail)
        }
    }
}

pub fn render_host_block(hostname: &str, data: &HostPayload) -> String {
    let mut block = format!("host {} {{\n", hostname);
    if let Some(mac) = &data.mac {
        block.push_str(&format!("    hardware ethernet {};\n", mac));
    }
    if let Some(ip) = &data.ip {
        block.push_str(&format!("    fixed-address {};\n", ip));
    }
    block.push_str("}\n");
    block
}

fn append_host(text: &str, hostname: &str, data: &HostPayload) -> String {
    let content = text.trim_end();
    let block = render_host_block(hostname, data);
    if content.is_empty() {
        block
    } else {
        format!("{}\n\n{}", content, block)
    }
}

/// Apply non-overlapping replacements given in ascending order
fn splice(text: &str, replacements: impl IntoIterator<Item = (Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in replacements {
        out.push_str(&text[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::dhcp::parse_dhcp_config;

    const DHCPD: &str = "option domain-name \"lan.example\";

host nas {
    hardware ethernet aa:bb:cc:dd:ee:ff;
    fixed-address 10.0.0.5;
    option host-name \"nas\";
}

host tv {
    hardware ethernet 11:22:33:44:55:66;
    fixed-address 10.0.0.6;
}
";

    #[test]
    fn test_delete_removes_only_that_block() {
        let out = apply_change(DHCPD, &DhcpChange::delete("nas"));
        assert!(!out.contains("host nas"));
        assert!(!out.contains("aa:bb:cc:dd:ee:ff"));

        let config = parse_dhcp_config(&out);
        let names: Vec<_> = config.hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["tv"]);
        assert_eq!(config.options.len(), 1);
        assert!(out.starts_with("option domain-name \"lan.example\";\n\nhost tv {"));
    }

    #[test]
    fn test_delete_missing_host_is_noop() {
        assert_eq!(apply_change(DHCPD, &DhcpChange::delete("ghost")), DHCPD);
    }

    #[test]
    fn test_edit_replaces_present_fields_only() {
        let change = DhcpChange::edit("nas", None, Some("10.0.0.50".to_string()));
        let out = apply_change(DHCPD, &change);

        let config = parse_dhcp_config(&out);
        let nas = config.hosts.iter().find(|h| h.name == "nas").unwrap();
        assert_eq!(nas.address.as_deref(), Some("10.0.0.50"));
        assert_eq!(nas.mac, "aa:bb:cc:dd:ee:ff");
        assert!(out.contains("option host-name \"nas\";"), "other statements survive");
        let tv = config.hosts.iter().find(|h| h.name == "tv").unwrap();
        assert_eq!(tv.address.as_deref(), Some("10.0.0.6"));
    }

    #[test]
    fn test_edit_appends_missing_statement() {
        let text = "host cam {\n    hardware ethernet 66:77:88:99:aa:bb;\n}\n";
        let change = DhcpChange::edit("cam", None, Some("10.0.0.7".to_string()));
        let out = apply_change(text, &change);
        assert_eq!(
            out,
            "host cam {\n    hardware ethernet 66:77:88:99:aa:bb;\n    fixed-address 10.0.0.7;\n}\n"
        );
    }

    #[test]
    fn test_edit_single_line_block() {
        let text = "host cam { hardware ethernet 66:77:88:99:aa:bb; }";
        let change = DhcpChange::edit(
            "CAM",
            Some("00:00:00:00:00:01".to_string()),
            Some("10.0.0.7".to_string()),
        );
        let out = apply_change(text, &change);
        let config = parse_dhcp_config(&out);
        assert_eq!(config.hosts[0].mac, "00:00:00:00:00:01");
        assert_eq!(config.hosts[0].address.as_deref(), Some("10.0.0.7"));
        assert!(out.starts_with("host cam {"));
        assert!(out.ends_with('}'));
    }

    #[test]
    fn test_add_appends_rendered_block() {
        let out = apply_change(DHCPD, &DhcpChange::add("printer", "de:ad:be:ef:00:01", "10.0.0.8"));
        assert!(out.starts_with(DHCPD.trim_end()));
        assert!(out.ends_with(
            "}\n\nhost printer {\n    hardware ethernet de:ad:be:ef:00:01;\n    fixed-address 10.0.0.8;\n}\n"
        ));
        assert_eq!(parse_dhcp_config(&out).hosts.len(), 3);
    }

    #[test]
    fn test_add_to_empty_file() {
        let out = apply_change("", &DhcpChange::add("nas", "aa:bb:cc:dd:ee:ff", "10.0.0.5"));
        assert_eq!(out, render_host_block("nas", &HostPayload {
            mac: Some("aa:bb:cc:dd:ee:ff".to_string()),
            ip: Some("10.0.0.5".to_string()),
        }));
    }

    #[test]
    fn test_fold_in_order() {
        let changes = vec![
            DhcpChange::add("printer", "de:ad:be:ef:00:01", "10.0.0.8"),
            DhcpChange::edit("printer", None, Some("10.0.0.80".to_string())),
            DhcpChange::delete("tv"),
        ];
        let out = fold_changes(DHCPD, &changes);
        assert_eq!(out.unmatched, 0);
        let config = parse_dhcp_config(&out.text);
        let names: Vec<_> = config.hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["nas", "printer"]);
        let printer = config.hosts.iter().find(|h| h.name == "printer").unwrap();
        assert_eq!(printer.address.as_deref(), Some("10.0.0.80"));
    }

    #[test]
    fn test_fold_nothing_is_identity() {
        assert_eq!(fold_changes(DHCPD, &[]).text, DHCPD);
    }

    #[test]
    fn test_fold_counts_changes_naming_no_host() {
        let changes = vec![
            DhcpChange::delete("ghost"),
            DhcpChange::edit("phantom", None, Some("10.0.0.9".to_string())),
            DhcpChange::delete("tv"),
        ];
        let out = fold_changes(DHCPD, &changes);
        assert_eq!(out.unmatched, 2);
        assert!(!out.text.contains("host tv"));
        assert!(out.text.contains("host nas"));
    }
}
