//! State module: the data model threaded through a crawl
//!
//! # Components
//!
//! - `CrawlJob`: one logical crawl run, owned by its scheduler
//! - `RequestDescriptor` / `ResponseEnvelope`: what goes out to the transport and what comes back
//! - `ExtractedRecord`: one field mapping plus provenance, immutable once emitted
//! - `PaginationState`: the continuation decision derived from a single document
//! - `PageOutcome`: how processing of one fetched page ended
//! - `HostState` / `HostBudget`: per-host politeness shared by concurrent jobs

mod host_state;
mod job;
mod page_outcome;
mod pagination;
mod record;
mod request;

// Re-export main types
pub use host_state::{HostBudget, HostState};
pub use job::CrawlJob;
pub use page_outcome::PageOutcome;
pub use pagination::PaginationState;
pub use record::{ExtractedRecord, Provenance};
pub use request::{RequestDescriptor, RequestKind, ResponseEnvelope, ENTITY_KEY_CONTEXT};
