//! Output module: merging, grouping and writing datasets
//!
//! This module handles:
//! - Merging partial records that describe the same entity
//! - Grouping finalized datasets and summarizing them
//! - Writing every dataset variant as JSON
//! - Reporting crawl statistics

mod dataset;
mod json_writer;
mod sink;
pub mod stats;
mod traits;

pub use dataset::{slugify, DatasetSummary, FinalizedOutput, GroupFile, UNGROUPED};
pub use json_writer::JsonDirectoryWriter;
pub use sink::{MergeSink, SharedSink};
pub use stats::{print_statistics, CrawlStatistics};
pub use traits::{OutputError, OutputHandler, OutputResult};
