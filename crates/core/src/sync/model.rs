//! Sync domain models: connections, mappings, sync units, and run records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Credentials handle for the remote service. The credential subsystem
/// decrypts the access token before it reaches this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConnection {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

/// Link between a local project and its remote counterpart.
///
/// Unique per (connection, local project) and per (connection, remote
/// project): a project maps to at most one remote project and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMapping {
    pub id: String,
    pub connection_id: String,
    pub local_project_id: String,
    pub remote_project_id: i64,
    pub enabled: bool,
    pub last_synced_at: Option<String>,
}

/// Audit snapshot of one entry's contribution to a synced unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitComponent {
    pub entry_id: String,
    pub minutes: i32,
    pub billable: bool,
    pub note: Option<String>,
}

/// Key of a sync unit: all work for one project on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncUnitKey {
    pub project_id: String,
    pub day: NaiveDate,
}

/// Derived aggregate of the local time entries for one (project, day).
/// Transient; rebuilt on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUnit {
    pub project_id: String,
    pub day: NaiveDate,
    pub total_minutes: i32,
    /// Total minutes / 60, rounded to 2 decimals.
    pub total_hours: Decimal,
    pub billable: bool,
    /// First non-empty note among contributors, in canonical entry order.
    pub note: Option<String>,
    pub entry_ids: Vec<String>,
    pub components: Vec<UnitComponent>,
    /// Digest over (day, total hours, billable, note).
    pub content_hash: String,
}

/// Persisted record of the last successful write for a (mapping, day) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedUnit {
    pub id: String,
    pub mapping_id: String,
    pub day: NaiveDate,
    /// Remote entry identifier; exceeds the 32-bit signed range.
    pub remote_entry_id: i64,
    pub last_hash: String,
    pub sync_version: i32,
    /// Kept for audit only; never read back by classification.
    pub components: Vec<UnitComponent>,
    pub created_at: String,
    pub updated_at: String,
}

/// Insertion payload for a freshly synced unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncedUnit {
    pub mapping_id: String,
    pub day: NaiveDate,
    pub remote_entry_id: i64,
    pub last_hash: String,
    pub components: Vec<UnitComponent>,
}

/// Sync run lifecycle status.
///
/// `Pending` exists as a placeholder only; the engine creates runs directly
/// in `Running` and always finalizes them to one of the terminal statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl SyncRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }
}

/// Direction of a sync run. Only pushes are implemented; the remote system
/// is never pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Push,
}

/// Attempt/outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub attempted: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
}

/// One failed unit, keyed by the local entries that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub project_id: String,
    pub day: NaiveDate,
    pub contributing_entry_ids: Vec<String>,
    pub message: String,
}

/// Persisted audit record of one run's lifecycle and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    pub connection_id: String,
    pub status: SyncRunStatus,
    pub direction: SyncDirection,
    pub counters: RunCounters,
    pub error_summary: Option<String>,
    pub failures: Vec<UnitFailure>,
    pub unmapped_projects: Vec<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Why a unit was skipped during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ZeroHours,
    Unmapped,
    Unchanged,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZeroHours => "zero hours",
            Self::Unmapped => "unmapped",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Action the engine decided on for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update,
    Skip,
}

/// Per-unit classification outcome, as returned by preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPlan {
    pub project_id: String,
    pub day: NaiveDate,
    pub total_hours: Decimal,
    pub action: PlannedAction,
    pub skip_reason: Option<SkipReason>,
}

/// Result of a classification-only pass; no remote writes, no mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreview {
    pub units: Vec<UnitPlan>,
    pub unmapped_projects: Vec<String>,
}

/// Caller-facing outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub run_id: String,
    pub status: SyncRunStatus,
    pub counters: RunCounters,
    pub unmapped_projects: Vec<String>,
    pub failures: Vec<UnitFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_partial_failed_are_terminal() {
        assert!(!SyncRunStatus::Pending.is_terminal());
        assert!(!SyncRunStatus::Running.is_terminal());
        assert!(SyncRunStatus::Completed.is_terminal());
        assert!(SyncRunStatus::Partial.is_terminal());
        assert!(SyncRunStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serialization_matches_persisted_contract() {
        let actual = [
            SyncRunStatus::Pending,
            SyncRunStatus::Running,
            SyncRunStatus::Completed,
            SyncRunStatus::Partial,
            SyncRunStatus::Failed,
        ]
        .iter()
        .map(|status| serde_json::to_string(status).expect("serialize status"))
        .collect::<Vec<_>>();

        let expected = vec![
            "\"pending\"",
            "\"running\"",
            "\"completed\"",
            "\"partial\"",
            "\"failed\"",
        ];
        assert_eq!(actual, expected);
    }
}
