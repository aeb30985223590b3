//! Repository and remote API contracts used by the sync engine.

use async_trait::async_trait;
use hourbook_remote::RemoteClient;

use crate::errors::Result;
use crate::sync::model::{
    NewSyncedUnit, ProjectMapping, RemoteConnection, RunCounters, SyncDirection, SyncRun,
    SyncRunStatus, SyncedUnit, UnitComponent, UnitFailure,
};

/// Access to remote connection records. The engine only ever reads the
/// already-decrypted token; credential management lives elsewhere.
#[async_trait]
pub trait ConnectionRepositoryTrait: Send + Sync {
    fn find_for_user(&self, user_id: &str) -> Result<Option<RemoteConnection>>;

    /// Stamp the connection's last-sync timestamp.
    async fn mark_synced(&self, connection_id: &str) -> Result<()>;
}

/// Access to local-to-remote project mappings.
#[async_trait]
pub trait ProjectMappingRepositoryTrait: Send + Sync {
    fn mappings_for_connection(&self, connection_id: &str) -> Result<Vec<ProjectMapping>>;

    async fn set_enabled(&self, mapping_id: &str, enabled: bool) -> Result<()>;

    /// Stamp the mapping's last-sync timestamp.
    async fn mark_synced(&self, mapping_id: &str) -> Result<()>;
}

/// Access to the per-(mapping, day) record of what was last pushed.
#[async_trait]
pub trait SyncedUnitRepositoryTrait: Send + Sync {
    fn find_for_mappings(&self, mapping_ids: &[String]) -> Result<Vec<SyncedUnit>>;

    async fn insert(&self, new_unit: NewSyncedUnit) -> Result<SyncedUnit>;

    /// Record a successful re-push: new hash and component snapshot,
    /// sync version incremented.
    async fn mark_updated(
        &self,
        unit_id: &str,
        content_hash: &str,
        components: &[UnitComponent],
    ) -> Result<()>;

    async fn delete(&self, unit_id: &str) -> Result<()>;
}

/// Access to the persisted run state machine.
#[async_trait]
pub trait SyncRunRepositoryTrait: Send + Sync {
    /// Atomically insert a RUNNING run for the connection. The persistence
    /// layer enforces at most one RUNNING row per connection; losing that
    /// race yields [`crate::Error::SyncInProgress`].
    async fn create_running(
        &self,
        connection_id: &str,
        direction: SyncDirection,
    ) -> Result<SyncRun>;

    /// Persist the terminal outcome and stamp the completion time.
    async fn complete(
        &self,
        run_id: &str,
        status: SyncRunStatus,
        counters: RunCounters,
        error_summary: Option<String>,
        failures: &[UnitFailure],
        unmapped_projects: &[String],
    ) -> Result<SyncRun>;

    fn get(&self, run_id: &str) -> Result<SyncRun>;

    fn list_recent(&self, connection_id: &str, limit: i64) -> Result<Vec<SyncRun>>;
}

/// Seam over the remote write/read operations the engine drives.
#[async_trait]
pub trait RemoteTimeApi: Send + Sync {
    async fn create_time_entry(
        &self,
        token: &str,
        payload: &hourbook_remote::TimeEntryPayload,
    ) -> hourbook_remote::Result<hourbook_remote::RemoteTimeEntry>;

    async fn update_time_entry(
        &self,
        token: &str,
        entry_id: i64,
        payload: &hourbook_remote::TimeEntryPayload,
    ) -> hourbook_remote::Result<hourbook_remote::RemoteTimeEntry>;

    async fn list_projects(
        &self,
        token: &str,
    ) -> hourbook_remote::Result<Vec<hourbook_remote::RemoteProject>>;
}

#[async_trait]
impl RemoteTimeApi for hourbook_remote::RemoteClient {
    async fn create_time_entry(
        &self,
        token: &str,
        payload: &hourbook_remote::TimeEntryPayload,
    ) -> hourbook_remote::Result<hourbook_remote::RemoteTimeEntry> {
        RemoteClient::create_time_entry(self, token, payload).await
    }

    async fn update_time_entry(
        &self,
        token: &str,
        entry_id: i64,
        payload: &hourbook_remote::TimeEntryPayload,
    ) -> hourbook_remote::Result<hourbook_remote::RemoteTimeEntry> {
        RemoteClient::update_time_entry(self, token, entry_id, payload).await
    }

    async fn list_projects(
        &self,
        token: &str,
    ) -> hourbook_remote::Result<Vec<hourbook_remote::RemoteProject>> {
        RemoteClient::list_projects(self, token).await
    }
}
