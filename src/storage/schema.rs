//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Gleaner record store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Merged records, one row per entity per dataset; rowid keeps first-ingest order
CREATE TABLE IF NOT EXISTS records (
    dataset TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    source TEXT NOT NULL,
    page INTEGER NOT NULL,
    fields TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (dataset, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_records_dataset ON records(dataset);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
