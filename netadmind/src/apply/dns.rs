use chrono::{DateTime, Local, TimeZone};
use shared::protocol::SERIAL_MARKER;
use shared::types::{ChangeAction, DnsChange, RecordPayload, RecordType};
use crate::reader::matchers;

/// Replay `changes` (all for one zone) against its text in order
pub fn fold_changes<'a>(text: &str, changes: impl IntoIterator<Item = &'a DnsChange>) -> String {
    changes
        .into_iter()
        .fold(text.to_string(), |acc, change| apply_change(&acc, change))
}

/// Apply one change. Edit and delete act on the first line, in file order,
/// whose name and type match; further duplicates are left alone.
pub fn apply_change(text: &str, change: &DnsChange) -> String {
    let record = &change.record;
    match change.action {
        ChangeAction::Add => append_record(text, record),
        ChangeAction::Edit => {
            let Some(line) = find_record_line(text, &record.name, record.record_type) else {
                tracing::warn!(
                    "Edit: no {} record {} in zone {}",
                    record.record_type,
                    record.name,
                    change.zone
                );
                return text.to_string();
            };
            let rdata = render_rdata(record);
            let replaced = format!("{}{}", &text[line.start..line.rdata_start], rdata);
            format!("{}{}{}", &text[..line.start], replaced, &text[line.end..])
        }
        ChangeAction::Delete => {
            let Some(line) = find_record_line(text, &record.name, record.record_type) else {
                tracing::warn!(
                    "Delete: no {} record {} in zone {}",
                    record.record_type,
                    record.name,
                    change.zone
                );
                return text.to_string();
            };
            format!("{}{}", &text[..line.start], &text[line.next..])
        }
    }
}

/// Byte offsets of a matched record line within the zone text
struct LineSpan {
    start: usize,
    rdata_start: usize,
    /// End of line content, before the terminator
    end: usize,
    /// Start of the following line
    next: usize,
}

fn find_record_line(text: &str, name: &str, record_type: RecordType) -> Option<LineSpan> {
    let mut start = 0;
    for raw in text.split_inclusive('\n') {
        let next = start + raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        if let Some(rec) = matchers::record_line(line) {
            if rec.record_type == record_type && rec.name.eq_ignore_ascii_case(name) {
                return Some(LineSpan {
                    start,
                    rdata_start: start + rec.rdata_start,
                    end: start + line.len(),
                    next,
                });
            }
        }
        start = next;
    }
    None
}

/// Rdata as written to the file: MX gets its preference, TXT gets quoted
pub fn render_rdata(record: &RecordPayload) -> String {
    let value = record.value.as_deref().unwrap_or_default();
    match record.record_type {
        RecordType::Mx => match &record.priority {
            Some(priority) => format!("{} {}", priority, value),
            None => value.to_string(),
        },
        RecordType::Txt if !value.starts_with('"') => format!("\"{}\"", value),
        _ => value.to_string(),
    }
}

pub fn render_record_line(record: &RecordPayload) -> String {
    format!("{}\tIN\t{}\t{}\n", record.name, record.record_type, render_rdata(record))
}

fn append_record(text: &str, record: &RecordPayload) -> String {
    let content = text.trim_end();
    let line = render_record_line(record);
    if content.is_empty() {
        line
    } else {
        format!("{}\n{}", content, line)
    }
}

/// Serial for a write at `now`: `YYYYMMDDHH`, bumped past `previous` when
/// the clock has not moved beyond it.
pub fn next_serial<Tz: TimeZone>(previous: u64, now: &DateTime<Tz>) -> u64
where
    Tz::Offset: std::fmt::Display,
{
    let stamped: u64 = now
        .format("%Y%m%d%H")
        .to_string()
        .parse()
        .unwrap_or(previous);
    stamped.max(previous + 1)
}

/// Rewrite the first `NNNNNNNNNN ; Serial` token. Text without one is
/// returned unchanged.
pub fn bump_serial<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(token) = matchers::serial(text) else {
        tracing::warn!("No serial token found; zone serial left unchanged");
        return text.to_string();
    };
    let serial = next_serial(token.value, now);
    format!(
        "{}{}  {}{}",
        &text[..token.span.start],
        serial,
        SERIAL_MARKER,
        &text[token.span.end..]
    )
}

/// Skeleton for a new zone: SOA with standard timers and one NS record
pub fn render_zone(soa_ns: &str, soa_email: &str, ttl: u32, now: &DateTime<Local>) -> String {
    let serial = now.format("%Y%m%d01");
    let ns = soa_ns.trim_end_matches('.');
    let email = soa_email.replace('@', ".");
    let email = email.trim_end_matches('.');
    let marker = SERIAL_MARKER;
    format!(
        "$TTL {ttl}
@   IN  SOA {ns}. {email}. (
            {serial}    {marker}
            3600        ; Refresh
            1800        ; Retry
            604800      ; Expire
            86400       ; Minimum TTL
        )
    IN  NS  {ns}.
"
    )
}
