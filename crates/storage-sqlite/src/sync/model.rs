//! Database models for sync state tables.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::remote_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RemoteConnectionDB {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::project_mappings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProjectMappingDB {
    pub id: String,
    pub connection_id: String,
    pub local_project_id: String,
    pub remote_project_id: i64,
    pub enabled: i32,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::synced_units)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncedUnitDB {
    pub id: String,
    pub mapping_id: String,
    pub day: String,
    pub remote_entry_id: i64,
    pub last_hash: String,
    pub sync_version: i32,
    pub components: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncRunDB {
    pub id: String,
    pub connection_id: String,
    pub status: String,
    pub direction: String,
    pub attempted: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub error_summary: Option<String>,
    pub error_details: Option<String>,
    pub unmapped_projects: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}
