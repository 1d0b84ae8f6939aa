use std::path::Path;
use shared::protocol::{JOURNAL_SUFFIX, REVERSE_ZONE_SUFFIX, STOCK_ZONE_FILES, ZONE_FILE_PREFIX};
use shared::types::{RecordType, Zone, ZoneListing, ZoneRecord};
use super::matchers;

/// Extract typed records from zone text.
///
/// Records are grouped by type in the order of [`RecordType::ALL`], and in
/// file order within a type.
pub fn parse_zone_records(text: &str) -> Vec<ZoneRecord> {
    RecordType::ALL
        .into_iter()
        .flat_map(|record_type| matchers::records_of_type(text, record_type))
        .map(|m| ZoneRecord {
            name: m.name.to_string(),
            record_type: m.record_type,
            value: m.value.to_string(),
            priority: m.priority.map(str::to_string),
            online: None,
            last_check: None,
        })
        .collect()
}

/// Reverse zones are named under `in-addr.arpa` or are bare dotted numbers
pub fn is_reverse_zone(name: &str) -> bool {
    if name.contains(REVERSE_ZONE_SUFFIX) {
        return true;
    }
    let digits: String = name.chars().filter(|c| *c != '.').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Whether a directory entry is a user-managed zone file
pub fn is_zone_file(file_name: &str) -> bool {
    file_name.starts_with(ZONE_FILE_PREFIX)
        && !file_name.ends_with(JOURNAL_SUFFIX)
        && !STOCK_ZONE_FILES.contains(&file_name)
}

/// List every zone under `dir`, sorted by name.
///
/// A zone whose file cannot be read is still listed, with `error` set and no
/// records. Failure to list the directory itself is reported on the listing.
pub fn read_zones(dir: &Path) -> ZoneListing {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            let message = format!("Failed to list {}: {}", dir.display(), e);
            tracing::warn!("{}", message);
            return ZoneListing {
                zones: Vec::new(),
                error: Some(message),
            };
        }
    };

    let mut zones = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !is_zone_file(&file_name) {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let name = file_name[ZONE_FILE_PREFIX.len()..].to_string();
        let file = path.display().to_string();
        let is_reverse = is_reverse_zone(&name);

        match super::read_text(&path) {
            Ok(text) => {
                let records = parse_zone_records(&text);
                zones.push(Zone {
                    name,
                    file,
                    is_reverse,
                    record_count: records.len(),
                    records,
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!("{}", e);
                let error = if e.is_permission_denied() {
                    "Permission denied".to_string()
                } else {
                    e.source.to_string()
                };
                zones.push(Zone {
                    name,
                    file,
                    is_reverse,
                    records: Vec::new(),
                    record_count: 0,
                    error: Some(error),
                });
            }
        }
    }

    zones.sort_by(|a, b| a.name.cmp(&b.name));
    ZoneListing { zones, error: None }
}
