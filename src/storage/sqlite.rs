//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::state::{ExtractedRecord, Provenance};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite record store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
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
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

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

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

impl RecordStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
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
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn upsert_record(&mut self, dataset: &str, record: &ExtractedRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let fields = serde_json::to_string(record.fields())?;
        let provenance = record.provenance();

        self.conn.execute(
            "INSERT INTO records (dataset, entity_key, source, page, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(dataset, entity_key) DO UPDATE SET
                source = excluded.source,
                page = excluded.page,
                fields = excluded.fields,
                updated_at = excluded.updated_at",
            params![
                dataset,
                provenance.entity_key,
                provenance.source,
                provenance.page,
                fields,
                now
            ],
        )?;

        Ok(())
    }

    fn load_records(&self, dataset: &str) -> StorageResult<Vec<ExtractedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_key, source, page, fields FROM records WHERE dataset = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![dataset], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (entity_key, source, page, fields_json) = row?;
            let fields: BTreeMap<String, String> =
                serde_json::from_str(&fields_json).map_err(|e| StorageError::CorruptRecord {
                    dataset: dataset.to_string(),
                    entity_key: entity_key.clone(),
                    message: e.to_string(),
                })?;

            records.push(ExtractedRecord::new(
                fields,
                Provenance {
                    source,
                    page,
                    entity_key,
                },
            ));
        }

        Ok(records)
    }

    fn count_records(&self, dataset: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE dataset = ?1",
            params![dataset],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn clear_records(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}
