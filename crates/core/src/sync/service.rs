//! Run orchestration: classification, remote writes, and run lifecycle.

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use hourbook_remote::{task_for_billable, RemoteErrorKind, RemoteProject, TimeEntryPayload};

use crate::errors::{Error, Result};
use crate::sync::aggregator::aggregate_entries;
use crate::sync::model::{
    NewSyncedUnit, PlannedAction, ProjectMapping, RemoteConnection, RunCounters, SkipReason,
    SyncDirection, SyncPreview, SyncRun, SyncRunReport, SyncRunStatus, SyncUnit, SyncUnitKey,
    SyncedUnit, UnitFailure, UnitPlan,
};
use crate::sync::retry::send_with_retry;
use crate::sync::traits::{
    ConnectionRepositoryTrait, ProjectMappingRepositoryTrait, RemoteTimeApi,
    SyncRunRepositoryTrait, SyncedUnitRepositoryTrait,
};
use crate::timesheet::TimeEntryRepositoryTrait;

/// Wall-clock budget for one full sync run.
const RUN_TIMEOUT_SECS: u64 = 300;
/// Courtesy pause between successive remote writes, independent of the
/// retry policy's backoff.
const INTER_WRITE_DELAY_MS: u64 = 100;
/// How many runs `list_recent_runs` returns.
const RECENT_RUN_LIMIT: i64 = 20;

/// Accumulated outcome of one run body.
#[derive(Debug, Clone, Default)]
struct RunTally {
    counters: RunCounters,
    failures: Vec<UnitFailure>,
    unmapped_projects: Vec<String>,
}

/// Everything classification needs, loaded up front.
struct RunContext {
    units: BTreeMap<SyncUnitKey, SyncUnit>,
    mappings_by_local: HashMap<String, ProjectMapping>,
    synced_by_key: HashMap<(String, NaiveDate), SyncedUnit>,
}

/// Outcome of one unit's remote write.
enum UnitOutcome {
    Succeeded,
    Failed(String),
    /// The remote project itself is gone; the mapping must be disabled.
    MappingDead(String),
}

/// Orchestrates sync runs: owns the run lifecycle, walks the aggregates,
/// and drives every classified write through the retry policy.
pub struct SyncService {
    connections: Arc<dyn ConnectionRepositoryTrait>,
    entries: Arc<dyn TimeEntryRepositoryTrait>,
    mappings: Arc<dyn ProjectMappingRepositoryTrait>,
    synced_units: Arc<dyn SyncedUnitRepositoryTrait>,
    runs: Arc<dyn SyncRunRepositoryTrait>,
    remote: Arc<dyn RemoteTimeApi>,
}

impl SyncService {
    pub fn new(
        connections: Arc<dyn ConnectionRepositoryTrait>,
        entries: Arc<dyn TimeEntryRepositoryTrait>,
        mappings: Arc<dyn ProjectMappingRepositoryTrait>,
        synced_units: Arc<dyn SyncedUnitRepositoryTrait>,
        runs: Arc<dyn SyncRunRepositoryTrait>,
        remote: Arc<dyn RemoteTimeApi>,
    ) -> Self {
        Self {
            connections,
            entries,
            mappings,
            synced_units,
            runs,
            remote,
        }
    }

    /// Push the user's tracked hours for an inclusive date range.
    ///
    /// Exactly one run per connection can be active at a time; the loser of
    /// a concurrent start receives [`Error::SyncInProgress`] and must retry
    /// later. Whatever happens inside the run body — partial failures, a
    /// catastrophic error, the wall-clock timeout — the run record is
    /// resolved to a terminal status before this returns or re-raises.
    pub async fn sync_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        force_sync: bool,
    ) -> Result<SyncRunReport> {
        let connection = self.require_connection(user_id)?;
        let run = self
            .runs
            .create_running(&connection.id, SyncDirection::Push)
            .await?;
        info!(
            "Started sync run {} for connection {} ({} to {}, force={})",
            run.id, connection.id, from, to, force_sync
        );

        let body = self.run_body(&connection, user_id, from, to, force_sync);
        match tokio::time::timeout(Duration::from_secs(RUN_TIMEOUT_SECS), body).await {
            Ok(Ok(tally)) => {
                let status = derive_terminal_status(&tally.counters);
                let summary = (tally.counters.failed > 0).then(|| {
                    format!(
                        "{} of {} attempted units failed",
                        tally.counters.failed, tally.counters.attempted
                    )
                });
                let run = self
                    .finalize_run(&run.id, &connection.id, status, &tally, summary)
                    .await?;
                Ok(SyncRunReport {
                    run_id: run.id,
                    status,
                    counters: tally.counters,
                    unmapped_projects: tally.unmapped_projects,
                    failures: tally.failures,
                })
            }
            Ok(Err(err)) => {
                // Catastrophic path: the run record must still reach a
                // terminal status before the error reaches the caller.
                self.finalize_failed_run(&run.id, &connection.id, err.to_string())
                    .await;
                Err(err)
            }
            Err(_elapsed) => {
                self.finalize_failed_run(
                    &run.id,
                    &connection.id,
                    format!("sync run timed out after {}s", RUN_TIMEOUT_SECS),
                )
                .await;
                Err(Error::Timeout(RUN_TIMEOUT_SECS))
            }
        }
    }

    /// Classify the range exactly as a run would, without issuing remote
    /// writes or mutating persisted state.
    pub fn preview_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        force_sync: bool,
    ) -> Result<SyncPreview> {
        let connection = self.require_connection(user_id)?;
        let context = self.load_context(&connection.id, user_id, from, to)?;

        let mut units = Vec::with_capacity(context.units.len());
        let mut unmapped_projects = Vec::new();
        for unit in context.units.values() {
            let mapping = context.mappings_by_local.get(unit.project_id.as_str());
            let existing =
                mapping.and_then(|m| context.synced_by_key.get(&(m.id.clone(), unit.day)));
            let (action, skip_reason) = classify_unit(unit, mapping, existing, force_sync);

            if skip_reason == Some(SkipReason::Unmapped)
                && !unmapped_projects.contains(&unit.project_id)
            {
                unmapped_projects.push(unit.project_id.clone());
            }
            units.push(UnitPlan {
                project_id: unit.project_id.clone(),
                day: unit.day,
                total_hours: unit.total_hours,
                action,
                skip_reason,
            });
        }

        Ok(SyncPreview {
            units,
            unmapped_projects,
        })
    }

    /// Fetch the remote project catalog for mapping administration.
    pub async fn list_remote_projects(&self, user_id: &str) -> Result<Vec<RemoteProject>> {
        let connection = self.require_connection(user_id)?;
        Ok(self
            .remote
            .list_projects(&connection.access_token)
            .await?)
    }

    pub fn get_run(&self, run_id: &str) -> Result<SyncRun> {
        self.runs.get(run_id)
    }

    pub fn list_recent_runs(&self, user_id: &str) -> Result<Vec<SyncRun>> {
        let connection = self.require_connection(user_id)?;
        self.runs.list_recent(&connection.id, RECENT_RUN_LIMIT)
    }

    fn require_connection(&self, user_id: &str) -> Result<RemoteConnection> {
        self.connections
            .find_for_user(user_id)?
            .ok_or_else(|| Error::ConnectionMissing(user_id.to_string()))
    }

    fn load_context(
        &self,
        connection_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RunContext> {
        let entries = self.entries.entries_for_range(user_id, from, to)?;
        let units = aggregate_entries(&entries);

        let mappings_by_local: HashMap<String, ProjectMapping> = self
            .mappings
            .mappings_for_connection(connection_id)?
            .into_iter()
            .filter(|mapping| mapping.enabled)
            .map(|mapping| (mapping.local_project_id.clone(), mapping))
            .collect();

        let mapping_ids: Vec<String> = mappings_by_local
            .values()
            .map(|mapping| mapping.id.clone())
            .collect();
        let synced_by_key: HashMap<(String, NaiveDate), SyncedUnit> = self
            .synced_units
            .find_for_mappings(&mapping_ids)?
            .into_iter()
            .map(|unit| ((unit.mapping_id.clone(), unit.day), unit))
            .collect();

        Ok(RunContext {
            units,
            mappings_by_local,
            synced_by_key,
        })
    }

    /// Walk the aggregates sequentially and accumulate the run tally.
    ///
    /// Per-unit failures never abort the walk; only persistence failures
    /// and other catastrophic conditions propagate out of here.
    async fn run_body(
        &self,
        connection: &RemoteConnection,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        force_sync: bool,
    ) -> Result<RunTally> {
        let context = self.load_context(&connection.id, user_id, from, to)?;
        let mut tally = RunTally::default();
        let mut dead_mappings: HashSet<String> = HashSet::new();
        let mut writes_issued = false;

        for unit in context.units.values() {
            let mapping = context.mappings_by_local.get(unit.project_id.as_str());
            let existing =
                mapping.and_then(|m| context.synced_by_key.get(&(m.id.clone(), unit.day)));
            let (action, skip_reason) = classify_unit(unit, mapping, existing, force_sync);

            if action == PlannedAction::Skip {
                tally.counters.skipped += 1;
                if skip_reason == Some(SkipReason::Unmapped)
                    && !tally.unmapped_projects.contains(&unit.project_id)
                {
                    tally.unmapped_projects.push(unit.project_id.clone());
                }
                debug!(
                    "Skipping {} on {}: {}",
                    unit.project_id,
                    unit.day,
                    skip_reason.map(|r| r.as_str()).unwrap_or("skip")
                );
                continue;
            }

            // Classification only yields create/update with an enabled mapping.
            let Some(mapping) = mapping else { continue };
            tally.counters.attempted += 1;

            if dead_mappings.contains(&mapping.id) {
                tally.counters.failed += 1;
                tally.failures.push(unit_failure(
                    unit,
                    "remote project no longer exists; mapping disabled".to_string(),
                ));
                continue;
            }

            if writes_issued {
                sleep(Duration::from_millis(INTER_WRITE_DELAY_MS)).await;
            }
            writes_issued = true;

            match self
                .write_unit(&connection.access_token, mapping, unit, existing)
                .await?
            {
                UnitOutcome::Succeeded => tally.counters.succeeded += 1,
                UnitOutcome::Failed(message) => {
                    tally.counters.failed += 1;
                    tally.failures.push(unit_failure(unit, message));
                }
                UnitOutcome::MappingDead(message) => {
                    warn!(
                        "Disabling mapping {} ({} -> {}): {}",
                        mapping.id, mapping.local_project_id, mapping.remote_project_id, message
                    );
                    self.mappings.set_enabled(&mapping.id, false).await?;
                    dead_mappings.insert(mapping.id.clone());
                    tally.counters.failed += 1;
                    tally.failures.push(unit_failure(unit, message));
                }
            }
        }

        Ok(tally)
    }

    /// Issue the remote write for one unit, including orphan recovery.
    ///
    /// An update that comes back not-found means the remote entry was
    /// deleted out-of-band: the stale synced-unit record is dropped and a
    /// fresh create takes its place. A create that comes back not-found
    /// means the remote project itself is gone.
    async fn write_unit(
        &self,
        token: &str,
        mapping: &ProjectMapping,
        unit: &SyncUnit,
        existing: Option<&SyncedUnit>,
    ) -> Result<UnitOutcome> {
        let payload = TimeEntryPayload {
            assignable_id: mapping.remote_project_id,
            date: unit.day,
            hours: unit.total_hours,
            notes: unit.note.clone(),
            task: task_for_billable(unit.billable).to_string(),
        };

        if let Some(existing) = existing {
            match send_with_retry(|| {
                self.remote
                    .update_time_entry(token, existing.remote_entry_id, &payload)
            })
            .await
            {
                Ok(_) => {
                    self.synced_units
                        .mark_updated(&existing.id, &unit.content_hash, &unit.components)
                        .await?;
                    self.mappings.mark_synced(&mapping.id).await?;
                    return Ok(UnitOutcome::Succeeded);
                }
                Err(err) if err.kind() == RemoteErrorKind::NotFound => {
                    warn!(
                        "Remote entry {} for {} on {} no longer exists; recreating",
                        existing.remote_entry_id, unit.project_id, unit.day
                    );
                    self.synced_units.delete(&existing.id).await?;
                    sleep(Duration::from_millis(INTER_WRITE_DELAY_MS)).await;
                }
                Err(err) => return Ok(UnitOutcome::Failed(err.to_string())),
            }
        }

        match send_with_retry(|| self.remote.create_time_entry(token, &payload)).await {
            Ok(remote_entry) => {
                self.synced_units
                    .insert(NewSyncedUnit {
                        mapping_id: mapping.id.clone(),
                        day: unit.day,
                        remote_entry_id: remote_entry.id,
                        last_hash: unit.content_hash.clone(),
                        components: unit.components.clone(),
                    })
                    .await?;
                self.mappings.mark_synced(&mapping.id).await?;
                Ok(UnitOutcome::Succeeded)
            }
            Err(err) if err.kind() == RemoteErrorKind::NotFound => Ok(UnitOutcome::MappingDead(
                format!(
                    "remote project {} no longer exists: {}",
                    mapping.remote_project_id, err
                ),
            )),
            Err(err) => Ok(UnitOutcome::Failed(err.to_string())),
        }
    }

    /// Persist the terminal outcome and stamp the connection.
    async fn finalize_run(
        &self,
        run_id: &str,
        connection_id: &str,
        status: SyncRunStatus,
        tally: &RunTally,
        error_summary: Option<String>,
    ) -> Result<SyncRun> {
        if !status.is_terminal() {
            return Err(Error::validation(format!(
                "sync runs cannot be completed with non-terminal status {:?}",
                status
            )));
        }

        let run = self
            .runs
            .complete(
                run_id,
                status,
                tally.counters,
                error_summary,
                &tally.failures,
                &tally.unmapped_projects,
            )
            .await?;
        self.connections.mark_synced(connection_id).await?;
        info!(
            "Sync run {} finished {:?}: attempted={} succeeded={} failed={} skipped={}",
            run_id,
            status,
            tally.counters.attempted,
            tally.counters.succeeded,
            tally.counters.failed,
            tally.counters.skipped
        );
        Ok(run)
    }

    /// Best-effort FAILED finalization for the catastrophic/timeout paths.
    /// The original error is what the caller must see; a secondary
    /// persistence failure here is logged, not surfaced.
    async fn finalize_failed_run(&self, run_id: &str, connection_id: &str, summary: String) {
        let tally = RunTally::default();
        if let Err(err) = self
            .finalize_run(
                run_id,
                connection_id,
                SyncRunStatus::Failed,
                &tally,
                Some(summary),
            )
            .await
        {
            error!("Failed to finalize sync run {}: {}", run_id, err);
        }
    }
}

fn unit_failure(unit: &SyncUnit, message: String) -> UnitFailure {
    UnitFailure {
        project_id: unit.project_id.clone(),
        day: unit.day,
        contributing_entry_ids: unit.entry_ids.clone(),
        message,
    }
}

/// Decide what to do with one unit. Evaluated strictly in this order:
/// zero hours, unmapped project, unchanged hash, then update-vs-create.
/// `force_sync` bypasses only the hash-equality skip.
fn classify_unit(
    unit: &SyncUnit,
    mapping: Option<&ProjectMapping>,
    existing: Option<&SyncedUnit>,
    force_sync: bool,
) -> (PlannedAction, Option<SkipReason>) {
    if unit.total_hours.is_zero() {
        return (PlannedAction::Skip, Some(SkipReason::ZeroHours));
    }
    if mapping.is_none() {
        return (PlannedAction::Skip, Some(SkipReason::Unmapped));
    }
    match existing {
        Some(synced) if !force_sync && synced.last_hash == unit.content_hash => {
            (PlannedAction::Skip, Some(SkipReason::Unchanged))
        }
        Some(_) => (PlannedAction::Update, None),
        None => (PlannedAction::Create, None),
    }
}

/// COMPLETED when nothing failed (including the nothing-to-do run);
/// PARTIAL when successes and failures mix; FAILED otherwise.
fn derive_terminal_status(counters: &RunCounters) -> SyncRunStatus {
    if counters.failed == 0 {
        SyncRunStatus::Completed
    } else if counters.succeeded > 0 {
        SyncRunStatus::Partial
    } else {
        SyncRunStatus::Failed
    }
}
