//! Integration tests for Gleaner
//!
//! Each module drives whole jobs against wiremock servers.

mod crawl_tests;
