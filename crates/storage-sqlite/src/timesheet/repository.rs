//! Repository for raw time entries.
//!
//! The sync engine treats entries as read-only input; writes exist for the
//! timesheet subsystem that owns them.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use hourbook_core::errors::{DatabaseError, Error, Result};
use hourbook_core::timesheet::{TimeEntry, TimeEntryRepositoryTrait};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::time_entries;

use super::model::TimeEntryDB;

fn parse_day(value: &str) -> Result<NaiveDate> {
    value.parse::<NaiveDate>().map_err(|e| {
        Error::Database(DatabaseError::Internal(format!(
            "Invalid calendar day '{}': {}",
            value, e
        )))
    })
}

fn to_time_entry(row: TimeEntryDB) -> Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.id,
        user_id: row.user_id,
        project_id: row.project_id,
        day: parse_day(&row.day)?,
        minutes: row.minutes,
        billable: row.billable != 0,
        note: row.note,
        skipped: row.skipped != 0,
    })
}

fn to_row(entry: &TimeEntry) -> TimeEntryDB {
    let now = Utc::now().to_rfc3339();
    TimeEntryDB {
        id: entry.id.clone(),
        user_id: entry.user_id.clone(),
        project_id: entry.project_id.clone(),
        day: entry.day.to_string(),
        minutes: entry.minutes,
        billable: i32::from(entry.billable),
        note: entry.note.clone(),
        skipped: i32::from(entry.skipped),
        created_at: now.clone(),
        updated_at: now,
    }
}

pub struct TimeEntryRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TimeEntryRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Insert or replace an entry. Used by the timesheet subsystem that
    /// produces entries, not by the sync engine.
    pub async fn upsert_entry(&self, entry: TimeEntry) -> Result<TimeEntry> {
        let row = to_row(&entry);
        self.writer
            .exec(move |conn| {
                diesel::insert_into(time_entries::table)
                    .values(&row)
                    .on_conflict(time_entries::id)
                    .do_update()
                    .set((
                        time_entries::project_id.eq(row.project_id.clone()),
                        time_entries::day.eq(row.day.clone()),
                        time_entries::minutes.eq(row.minutes),
                        time_entries::billable.eq(row.billable),
                        time_entries::note.eq(row.note.clone()),
                        time_entries::skipped.eq(row.skipped),
                        time_entries::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;
        Ok(entry)
    }
}

impl TimeEntryRepositoryTrait for TimeEntryRepository {
    fn entries_for_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let mut conn = get_connection(&self.pool)?;
        // ISO day strings order lexicographically, so a text BETWEEN works.
        let rows = time_entries::table
            .filter(time_entries::user_id.eq(user_id))
            .filter(time_entries::day.ge(from.to_string()))
            .filter(time_entries::day.le(to.to_string()))
            .filter(time_entries::project_id.is_not_null())
            .filter(time_entries::skipped.eq(0))
            .order(time_entries::day.asc())
            .load::<TimeEntryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_time_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    fn setup_repo() -> TimeEntryRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        TimeEntryRepository::new(pool, writer)
    }

    fn entry(id: &str, day: &str, project: Option<&str>, skipped: bool) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            project_id: project.map(|p| p.to_string()),
            day: day.parse().expect("day"),
            minutes: 60,
            billable: true,
            note: None,
            skipped,
        }
    }

    #[tokio::test]
    async fn range_query_filters_unresolved_and_skipped_entries() {
        let repo = setup_repo();
        repo.upsert_entry(entry("in-range", "2026-03-03", Some("proj-1"), false))
            .await
            .expect("insert");
        repo.upsert_entry(entry("no-project", "2026-03-03", None, false))
            .await
            .expect("insert");
        repo.upsert_entry(entry("skipped", "2026-03-04", Some("proj-1"), true))
            .await
            .expect("insert");
        repo.upsert_entry(entry("before-range", "2026-02-27", Some("proj-1"), false))
            .await
            .expect("insert");

        let entries = repo
            .entries_for_range(
                "user-1",
                "2026-03-02".parse().expect("day"),
                "2026-03-08".parse().expect("day"),
            )
            .expect("query");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "in-range");
        assert!(entries[0].billable);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_entry() {
        let repo = setup_repo();
        repo.upsert_entry(entry("a", "2026-03-03", Some("proj-1"), false))
            .await
            .expect("insert");

        let mut updated = entry("a", "2026-03-03", Some("proj-1"), false);
        updated.minutes = 90;
        repo.upsert_entry(updated).await.expect("upsert");

        let entries = repo
            .entries_for_range(
                "user-1",
                "2026-03-02".parse().expect("day"),
                "2026-03-08".parse().expect("day"),
            )
            .expect("query");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].minutes, 90);
    }
}
