//! URL handling module for Gleaner
//!
//! This module provides link resolution, comparison-oriented normalization,
//! host extraction, path-segment lookup and wildcard domain matching.

mod domain;
mod matcher;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::{extract_domain, host_of, path_segment_from_end};
pub use matcher::is_allowed_domain;
pub use normalize::{normalize_url, same_page};
pub use resolve::{resolve_against, resolve_link, set_query_param};
