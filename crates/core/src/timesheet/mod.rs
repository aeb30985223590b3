//! Timesheet domain models: the raw, read-only input to the sync engine.

mod model;

pub use model::*;

use crate::errors::Result;
use chrono::NaiveDate;

/// Read access to raw time entries.
///
/// Implementations return entries already filtered to a resolved project and
/// not marked skipped; the engine never mutates them.
pub trait TimeEntryRepositoryTrait: Send + Sync {
    fn entries_for_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>>;
}
