//! Aggregation of raw time entries into per-(project, day) sync units.

use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::sync::model::{SyncUnit, SyncUnitKey, UnitComponent};
use crate::timesheet::TimeEntry;

const MINUTES_PER_HOUR: i64 = 60;

/// Compute the content hash for a unit's synced representation.
///
/// Only fields that reach the remote system participate: day, rounded
/// hours, billable flag, note. Contributing entry ids deliberately do not.
pub fn content_hash(
    day: NaiveDate,
    total_hours: Decimal,
    billable: bool,
    note: Option<&str>,
) -> String {
    let canonical = format!(
        "{}|{:.2}|{}|{}",
        day,
        total_hours,
        billable,
        note.unwrap_or("")
    );
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Group raw entries into one sync unit per (project, day).
///
/// Pure function; entries are canonically ordered by id first so totals,
/// note selection, and the content hash are independent of input order.
/// Entries without a resolved project are skipped defensively (the
/// repository query should already have excluded them).
pub fn aggregate_entries(entries: &[TimeEntry]) -> BTreeMap<SyncUnitKey, SyncUnit> {
    let mut ordered: Vec<&TimeEntry> = entries.iter().filter(|e| !e.skipped).collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut units: BTreeMap<SyncUnitKey, SyncUnit> = BTreeMap::new();

    for entry in ordered {
        let Some(project_id) = entry.project_id.as_deref() else {
            warn!("Time entry {} has no resolved project; skipping", entry.id);
            continue;
        };

        let key = SyncUnitKey {
            project_id: project_id.to_string(),
            day: entry.day,
        };

        let unit = units.entry(key).or_insert_with(|| SyncUnit {
            project_id: project_id.to_string(),
            day: entry.day,
            total_minutes: 0,
            total_hours: Decimal::ZERO,
            billable: entry.billable,
            note: None,
            entry_ids: Vec::new(),
            components: Vec::new(),
            content_hash: String::new(),
        });

        // Billable is project-scoped, so contributors should always agree.
        // If they don't, the first value wins and we log rather than abort.
        if unit.billable != entry.billable {
            warn!(
                "Billable flag mismatch for project {} on {}: entry {} says {}, keeping {}",
                project_id, entry.day, entry.id, entry.billable, unit.billable
            );
        }

        unit.total_minutes += entry.minutes;
        if unit.note.is_none() {
            if let Some(note) = entry.note.as_deref() {
                if !note.trim().is_empty() {
                    unit.note = Some(note.to_string());
                }
            }
        }
        unit.entry_ids.push(entry.id.clone());
        unit.components.push(UnitComponent {
            entry_id: entry.id.clone(),
            minutes: entry.minutes,
            billable: entry.billable,
            note: entry.note.clone(),
        });
    }

    for unit in units.values_mut() {
        unit.total_hours =
            (Decimal::from(unit.total_minutes) / Decimal::from(MINUTES_PER_HOUR)).round_dp(2);
        unit.content_hash = content_hash(
            unit.day,
            unit.total_hours,
            unit.billable,
            unit.note.as_deref(),
        );
    }

    units
}
