//! Raw time entry model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One tracked unit of work, as produced by the timesheet subsystem
/// (manual tracking, calendar import, or categorization).
///
/// The billable flag is a property of the project and is expected to be
/// constant across all entries for the same project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    /// Local project reference; entries without one are never synced.
    pub project_id: Option<String>,
    pub day: NaiveDate,
    pub minutes: i32,
    pub billable: bool,
    pub note: Option<String>,
    /// Entries flagged as skipped are excluded from sync entirely.
    pub skipped: bool,
}
