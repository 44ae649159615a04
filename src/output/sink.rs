//! Merge/aggregation sink

use crate::config::DatasetConfig;
use crate::output::FinalizedOutput;
use crate::state::ExtractedRecord;
use crate::storage::{SharedStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A sink shared by every job feeding the same dataset
///
/// The mutex is the single-writer discipline: one `ingest` at a time.
pub type SharedSink = Arc<Mutex<MergeSink>>;

/// Collects records for one dataset, merging those that share an entity key
///
/// Merging never regresses a non-empty field to empty. Records keep the
/// position of the first record seen for their entity key.
pub struct MergeSink {
    dataset: String,
    group_by: Vec<String>,
    order: Vec<String>,
    records: HashMap<String, ExtractedRecord>,
    store: Option<SharedStore>,
}

impl MergeSink {
    /// Creates an empty, memory-only sink
    pub fn new(dataset: &DatasetConfig) -> Self {
        Self {
            dataset: dataset.name.clone(),
            group_by: dataset.group_by.clone(),
            order: Vec::new(),
            records: HashMap::new(),
            store: None,
        }
    }

    /// Upserts every merged record into `store` from now on
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Rebuilds a sink from the records already in `store`
    ///
    /// The returned sink keeps writing to the same store.
    pub fn restore(dataset: &DatasetConfig, store: SharedStore) -> StorageResult<Self> {
        let stored = store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .load_records(&dataset.name)?;

        let mut sink = Self::new(dataset);
        for record in stored {
            sink.merge_in_memory(record);
        }

        tracing::debug!(
            "Restored {} records for dataset {}",
            sink.len(),
            sink.dataset
        );
        Ok(sink.with_store(store))
    }

    /// Wraps the sink for sharing between jobs
    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current merged record for an entity key
    pub fn get(&self, entity_key: &str) -> Option<&ExtractedRecord> {
        self.records.get(entity_key)
    }

    /// Adds a record, merging it with any earlier record of the same entity
    ///
    /// The in-memory collection is always updated. A store failure is
    /// returned after the fact so the caller can log it and carry on.
    pub fn ingest(&mut self, record: ExtractedRecord) -> Result<(), StorageError> {
        let merged = self.merge_in_memory(record);

        match &self.store {
            Some(store) => store
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .upsert_record(&self.dataset, &merged),
            None => Ok(()),
        }
    }

    fn merge_in_memory(&mut self, record: ExtractedRecord) -> ExtractedRecord {
        let key = record.entity_key().to_string();
        let merged = match self.records.get(&key) {
            Some(existing) => existing.merged_with(&record),
            None => {
                self.order.push(key.clone());
                record
            }
        };

        self.records.insert(key, merged.clone());
        merged
    }

    /// Groups the merged collection and builds every output variant
    ///
    /// Does not consume or modify the sink: calling it twice with no `ingest`
    /// in between yields identical output.
    pub fn finalize(&self) -> FinalizedOutput {
        let records = self
            .order
            .iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect();

        FinalizedOutput::build(&self.dataset, records, &self.group_by)
    }
}
