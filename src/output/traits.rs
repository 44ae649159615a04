//! Output handler traits and error types
//!
//! This module defines the trait interface for whatever receives finalized
//! datasets, and the errors raised while writing them.

use crate::output::FinalizedOutput;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for output handlers
///
/// A handler persists one finalized dataset, writing every file variant in
/// one go. Writing the same output twice must produce the same bytes.
pub trait OutputHandler {
    /// Persists a finalized dataset
    ///
    /// # Returns
    ///
    /// The paths written, full dataset first
    fn write(&self, output: &FinalizedOutput) -> OutputResult<Vec<PathBuf>>;
}
