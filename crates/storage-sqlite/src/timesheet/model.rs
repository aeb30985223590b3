//! Database model for the time entries table.

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
#[diesel(table_name = crate::schema::time_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimeEntryDB {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub day: String,
    pub minutes: i32,
    pub billable: i32,
    pub note: Option<String>,
    pub skipped: i32,
    pub created_at: String,
    pub updated_at: String,
}
