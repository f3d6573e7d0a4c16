use std::collections::BTreeMap;

use ringline_core::{DayRule, TenantConfig};

use crate::source::{RawRow, RawTables};

/// Folds raw backend rows into a usable config snapshot.
///
/// Key/value tables use last-write-wins on duplicate keys. The schedule table
/// stays an ordered sequence and is deliberately not deduplicated by day; the
/// evaluator's first-match rule decides which duplicate counts.
pub fn normalize(tables: RawTables) -> TenantConfig {
    TenantConfig {
        settings: fold_pairs(&tables.settings, "key", "value"),
        schedule: tables.schedule.iter().map(day_rule).collect(),
        prompts: fold_pairs(&tables.prompts, "key", "text"),
        repair_scope: fold_pairs(&tables.repair_scope, "key", "value"),
    }
}

fn fold_pairs(rows: &[RawRow], key_column: &str, value_column: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for row in rows {
        let Some(key) = row.get(key_column).map(String::as_str).filter(|k| !k.is_empty()) else {
            continue;
        };
        let value = row.get(value_column).cloned().unwrap_or_default();
        map.insert(key.to_owned(), value);
    }
    map
}

fn day_rule(row: &RawRow) -> DayRule {
    DayRule {
        day: row.get("day").cloned().unwrap_or_default(),
        enabled: row.get("enabled").cloned(),
        start: row.get("start").cloned(),
        end: row.get("end").cloned(),
    }
}
