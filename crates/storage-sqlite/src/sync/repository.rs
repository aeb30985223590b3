//! Repositories for sync state: connections, mappings, synced units, runs.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use hourbook_core::errors::{DatabaseError, Error, Result};
use hourbook_core::sync::{
    ConnectionRepositoryTrait, NewSyncedUnit, ProjectMapping, ProjectMappingRepositoryTrait,
    RemoteConnection, RunCounters, SyncDirection, SyncRun, SyncRunRepositoryTrait, SyncRunStatus,
    SyncedUnit, SyncedUnitRepositoryTrait, UnitComponent, UnitFailure,
};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{project_mappings, remote_connections, sync_runs, synced_units};

use super::model::{ProjectMappingDB, RemoteConnectionDB, SyncRunDB, SyncedUnitDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    value.parse::<NaiveDate>().map_err(|e| {
        Error::Database(DatabaseError::Internal(format!(
            "Invalid calendar day '{}': {}",
            value, e
        )))
    })
}

fn to_connection(row: RemoteConnectionDB) -> RemoteConnection {
    RemoteConnection {
        id: row.id,
        user_id: row.user_id,
        access_token: row.access_token,
        last_synced_at: row.last_synced_at,
        created_at: row.created_at,
    }
}

fn to_mapping(row: ProjectMappingDB) -> ProjectMapping {
    ProjectMapping {
        id: row.id,
        connection_id: row.connection_id,
        local_project_id: row.local_project_id,
        remote_project_id: row.remote_project_id,
        enabled: row.enabled != 0,
        last_synced_at: row.last_synced_at,
    }
}

fn to_synced_unit(row: SyncedUnitDB) -> Result<SyncedUnit> {
    let components: Vec<UnitComponent> = serde_json::from_str(&row.components)?;
    Ok(SyncedUnit {
        id: row.id,
        mapping_id: row.mapping_id,
        day: parse_day(&row.day)?,
        remote_entry_id: row.remote_entry_id,
        last_hash: row.last_hash,
        sync_version: row.sync_version,
        components,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn to_sync_run(row: SyncRunDB) -> Result<SyncRun> {
    let failures: Vec<UnitFailure> = match row.error_details.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => Vec::new(),
    };
    let unmapped_projects: Vec<String> = match row.unmapped_projects.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => Vec::new(),
    };
    Ok(SyncRun {
        id: row.id,
        connection_id: row.connection_id,
        status: enum_from_db(&row.status)?,
        direction: enum_from_db(&row.direction)?,
        counters: RunCounters {
            attempted: row.attempted,
            succeeded: row.succeeded,
            failed: row.failed,
            skipped: row.skipped,
        },
        error_summary: row.error_summary,
        failures,
        unmapped_projects,
        started_at: row.started_at,
        completed_at: row.completed_at,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Connections
// ─────────────────────────────────────────────────────────────────────────

pub struct ConnectionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ConnectionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Register (or replace the token of) the user's remote connection.
    /// The credential subsystem hands over an already-decrypted token.
    pub async fn upsert_connection(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<RemoteConnection> {
        let row = RemoteConnectionDB {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
            last_synced_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        self.writer
            .exec(move |conn| {
                diesel::insert_into(remote_connections::table)
                    .values(&row)
                    .on_conflict(remote_connections::user_id)
                    .do_update()
                    .set(remote_connections::access_token.eq(row.access_token.clone()))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let stored = remote_connections::table
                    .filter(remote_connections::user_id.eq(&row.user_id))
                    .first::<RemoteConnectionDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(to_connection(stored))
            })
            .await
    }
}

#[async_trait]
impl ConnectionRepositoryTrait for ConnectionRepository {
    fn find_for_user(&self, user_id: &str) -> Result<Option<RemoteConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let row = remote_connections::table
            .filter(remote_connections::user_id.eq(user_id))
            .first::<RemoteConnectionDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(to_connection))
    }

    async fn mark_synced(&self, connection_id: &str) -> Result<()> {
        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(remote_connections::table.find(&connection_id))
                    .set(remote_connections::last_synced_at.eq(Some(Utc::now().to_rfc3339())))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Project mappings
// ─────────────────────────────────────────────────────────────────────────

pub struct ProjectMappingRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProjectMappingRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Map a local project onto a remote project, re-enabling and
    /// re-pointing an existing mapping if one is present. The remote-side
    /// unique index keeps a remote project from being claimed twice.
    pub async fn upsert_mapping(
        &self,
        connection_id: &str,
        local_project_id: &str,
        remote_project_id: i64,
    ) -> Result<ProjectMapping> {
        let row = ProjectMappingDB {
            id: Uuid::now_v7().to_string(),
            connection_id: connection_id.to_string(),
            local_project_id: local_project_id.to_string(),
            remote_project_id,
            enabled: 1,
            last_synced_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        self.writer
            .exec(move |conn| {
                diesel::insert_into(project_mappings::table)
                    .values(&row)
                    .on_conflict((
                        project_mappings::connection_id,
                        project_mappings::local_project_id,
                    ))
                    .do_update()
                    .set((
                        project_mappings::remote_project_id.eq(row.remote_project_id),
                        project_mappings::enabled.eq(1),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let stored = project_mappings::table
                    .filter(project_mappings::connection_id.eq(&row.connection_id))
                    .filter(project_mappings::local_project_id.eq(&row.local_project_id))
                    .first::<ProjectMappingDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(to_mapping(stored))
            })
            .await
    }
}

#[async_trait]
impl ProjectMappingRepositoryTrait for ProjectMappingRepository {
    fn mappings_for_connection(&self, connection_id: &str) -> Result<Vec<ProjectMapping>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = project_mappings::table
            .filter(project_mappings::connection_id.eq(connection_id))
            .load::<ProjectMappingDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(to_mapping).collect())
    }

    async fn set_enabled(&self, mapping_id: &str, enabled: bool) -> Result<()> {
        let mapping_id = mapping_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(project_mappings::table.find(&mapping_id))
                    .set(project_mappings::enabled.eq(i32::from(enabled)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_synced(&self, mapping_id: &str) -> Result<()> {
        let mapping_id = mapping_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(project_mappings::table.find(&mapping_id))
                    .set(project_mappings::last_synced_at.eq(Some(Utc::now().to_rfc3339())))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Synced units
// ─────────────────────────────────────────────────────────────────────────

pub struct SyncedUnitRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncedUnitRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncedUnitRepositoryTrait for SyncedUnitRepository {
    fn find_for_mappings(&self, mapping_ids: &[String]) -> Result<Vec<SyncedUnit>> {
        if mapping_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = synced_units::table
            .filter(synced_units::mapping_id.eq_any(mapping_ids))
            .load::<SyncedUnitDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_synced_unit).collect()
    }

    async fn insert(&self, new_unit: NewSyncedUnit) -> Result<SyncedUnit> {
        let now = Utc::now().to_rfc3339();
        let row = SyncedUnitDB {
            id: Uuid::now_v7().to_string(),
            mapping_id: new_unit.mapping_id,
            day: new_unit.day.to_string(),
            remote_entry_id: new_unit.remote_entry_id,
            last_hash: new_unit.last_hash,
            sync_version: 1,
            components: serde_json::to_string(&new_unit.components)?,
            created_at: now.clone(),
            updated_at: now,
        };

        self.writer
            .exec(move |conn| {
                diesel::insert_into(synced_units::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                to_synced_unit(row)
            })
            .await
    }

    async fn mark_updated(
        &self,
        unit_id: &str,
        content_hash: &str,
        components: &[UnitComponent],
    ) -> Result<()> {
        let unit_id = unit_id.to_string();
        let content_hash = content_hash.to_string();
        let components_json = serde_json::to_string(components)?;
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(synced_units::table.find(&unit_id))
                    .set((
                        synced_units::last_hash.eq(&content_hash),
                        synced_units::components.eq(&components_json),
                        synced_units::sync_version.eq(synced_units::sync_version + 1),
                        synced_units::updated_at.eq(Utc::now().to_rfc3339()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "synced unit {}",
                        unit_id
                    ))));
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, unit_id: &str) -> Result<()> {
        let unit_id = unit_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(synced_units::table.find(&unit_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Sync runs
// ─────────────────────────────────────────────────────────────────────────

pub struct SyncRunRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncRunRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncRunRepositoryTrait for SyncRunRepository {
    async fn create_running(
        &self,
        connection_id: &str,
        direction: SyncDirection,
    ) -> Result<SyncRun> {
        let row = SyncRunDB {
            id: Uuid::now_v7().to_string(),
            connection_id: connection_id.to_string(),
            status: enum_to_db(&SyncRunStatus::Running)?,
            direction: enum_to_db(&direction)?,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            error_summary: None,
            error_details: None,
            unmapped_projects: None,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        };

        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                // The partial unique index on (connection_id) WHERE
                // status = 'running' is the single-flight gate: the loser
                // of a concurrent start sees a uniqueness violation.
                let inserted = diesel::insert_into(sync_runs::table)
                    .values(&row)
                    .execute(conn);
                match inserted {
                    Ok(_) => to_sync_run(row),
                    Err(err) => {
                        let storage = StorageError::from(err);
                        if storage.is_unique_violation() {
                            Err(Error::SyncInProgress(connection_id.clone()))
                        } else {
                            Err(Error::from(storage))
                        }
                    }
                }
            })
            .await
    }

    async fn complete(
        &self,
        run_id: &str,
        status: SyncRunStatus,
        counters: RunCounters,
        error_summary: Option<String>,
        failures: &[UnitFailure],
        unmapped_projects: &[String],
    ) -> Result<SyncRun> {
        let run_id = run_id.to_string();
        let status_db = enum_to_db(&status)?;
        let details = serde_json::to_string(failures)?;
        let unmapped = serde_json::to_string(unmapped_projects)?;

        self.writer
            .exec(move |conn| {
                let updated = diesel::update(sync_runs::table.find(&run_id))
                    .set((
                        sync_runs::status.eq(&status_db),
                        sync_runs::attempted.eq(counters.attempted),
                        sync_runs::succeeded.eq(counters.succeeded),
                        sync_runs::failed.eq(counters.failed),
                        sync_runs::skipped.eq(counters.skipped),
                        sync_runs::error_summary.eq(error_summary.clone()),
                        sync_runs::error_details.eq(Some(details.clone())),
                        sync_runs::unmapped_projects.eq(Some(unmapped.clone())),
                        sync_runs::completed_at.eq(Some(Utc::now().to_rfc3339())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "sync run {}",
                        run_id
                    ))));
                }

                let stored = sync_runs::table
                    .find(&run_id)
                    .first::<SyncRunDB>(conn)
                    .map_err(StorageError::from)?;
                to_sync_run(stored)
            })
            .await
    }

    fn get(&self, run_id: &str) -> Result<SyncRun> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_runs::table
            .find(run_id)
            .first::<SyncRunDB>(&mut conn)
            .map_err(StorageError::from)?;
        to_sync_run(row)
    }

    fn list_recent(&self, connection_id: &str, limit: i64) -> Result<Vec<SyncRun>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_runs::table
            .filter(sync_runs::connection_id.eq(connection_id))
            .order(sync_runs::started_at.desc())
            .limit(limit)
            .load::<SyncRunDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_sync_run).collect()
    }
}
