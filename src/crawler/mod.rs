//! Crawler module: everything between a job's seeds and its records
//!
//! This module contains the core crawling logic, including:
//! - The per-job fetch scheduler (FIFO queue, politeness, cancellation)
//! - HTTP fetching into response envelopes
//! - Source resolution (structured or markup documents)
//! - Next-page discovery and termination
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod pagination;
mod resolver;
mod scheduler;

pub use coordinator::{
    export_from_store, retry_backoff, run_crawl, Coordinator, CrawlOptions, CrawlOutcome,
    JobReport,
};
pub use fetcher::{build_http_client, Fetcher};
pub use pagination::PaginationController;
pub use resolver::{Document, DocumentKind, SourceResolver};
pub use scheduler::Scheduler;
