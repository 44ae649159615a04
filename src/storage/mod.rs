//! Storage module for the durable record store
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Merged record persistence, keyed by dataset and entity key
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex};

/// A record store shared by every sink and job of a run
pub type SharedStore = Arc<Mutex<dyn RecordStore>>;

/// Opens the SQLite store at `path` behind a shared handle
pub fn open_store(path: &Path) -> StorageResult<SharedStore> {
    let store: SharedStore = Arc::new(Mutex::new(SqliteStore::new(path)?));
    Ok(store)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_open_shared_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.db")).unwrap();

        let run_id = store.lock().unwrap().create_run("hash").unwrap();
        assert_eq!(store.lock().unwrap().get_run(run_id).unwrap().id, run_id);
    }
}
