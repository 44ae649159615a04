//! Storage traits and error types
//!
//! This module defines the trait interface for durable record stores and
//! associated error types.

use crate::state::ExtractedRecord;
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt record {dataset}/{entity_key}: {message}")]
    CorruptRecord {
        dataset: String,
        entity_key: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable record store implementations
///
/// A store keeps the merged record for each (dataset, entity key) pair plus
/// bookkeeping for crawl runs. Implementations must be `Send` so a single
/// store can sit behind a mutex shared by concurrently running jobs.
pub trait RecordStore: Send {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status of a run and stamps its finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts or replaces the merged record for its entity key
    ///
    /// A replaced record keeps its original position in the dataset.
    fn upsert_record(&mut self, dataset: &str, record: &ExtractedRecord) -> StorageResult<()>;

    /// Loads every record of a dataset in first-ingest order
    fn load_records(&self, dataset: &str) -> StorageResult<Vec<ExtractedRecord>>;

    /// Counts the records of a dataset
    fn count_records(&self, dataset: &str) -> StorageResult<u64>;

    /// Deletes every stored record (runs are kept)
    fn clear_records(&mut self) -> StorageResult<()>;
}
