//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the DocumentStore
//! trait. Each product is stored as a JSON document next to a few indexed
//! columns.

use crate::crawler::ProductRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, UpsertOutcome};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite document store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database file at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database, used for dry runs and tests
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

#[cfg(test)]
impl SqliteStore {
    /// Gets a product by id
    pub(crate) fn get_product(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<ProductRecord>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let categories: String = row.get(4)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        categories: serde_json::from_str(&categories).unwrap_or_default(),
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Failed),
        succeeded: row.get::<_, i64>(6)? as u64,
        skipped: row.get::<_, i64>(7)? as u64,
    })
}

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, categories, status, succeeded, skipped";

impl DocumentStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, categories: &[String]) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let categories = serde_json::to_string(categories)?;
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, categories, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, categories, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        skipped: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, succeeded = ?3, skipped = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                succeeded as i64,
                skipped as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn interrupt_stale_runs(&mut self) -> StorageResult<usize> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    // ===== Documents =====

    fn upsert_product(
        &mut self,
        collection: &str,
        record: &ProductRecord,
    ) -> StorageResult<UpsertOutcome> {
        let body = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, record.id],
                |row| row.get(0),
            )
            .optional()?;

        // first_seen_at is only written on insert
        tx.execute(
            "INSERT INTO documents (collection, id, url, title, body, fetched_at, first_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(collection, id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                body = excluded.body,
                fetched_at = excluded.fetched_at,
                updated_at = excluded.updated_at",
            params![
                collection,
                record.id,
                record.url,
                record.title,
                body,
                record.fetched_at.to_rfc3339(),
                now
            ],
        )?;

        tx.commit()?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn count_products(&self, collection: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_products(&self, collection: &str) -> StorageResult<Vec<ProductRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM documents WHERE collection = ?1 ORDER BY first_seen_at, id",
        )?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StorageError::from))
            .collect()
    }
}
