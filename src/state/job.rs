use crate::state::RequestDescriptor;
use std::time::Duration;

/// One logical crawl run
///
/// Created at job start and handed to the job's scheduler, which owns it until
/// the pagination loop terminates.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// Job identifier, also used as the record source
    pub id: String,

    /// Seed requests, fetched first and in order
    pub seeds: Vec<RequestDescriptor>,

    /// Highest listing page number that may be fetched
    pub page_ceiling: u32,

    /// Listing page currently being processed (starts at 1)
    pub current_page: u32,

    /// Minimum wait between the end of one fetch and the start of the next
    pub politeness_delay: Duration,
}

impl CrawlJob {
    /// Creates a job positioned on its first page
    ///
    /// A zero ceiling is raised to 1 so the seeds are always fetched.
    pub fn new(
        id: impl Into<String>,
        seeds: Vec<RequestDescriptor>,
        page_ceiling: u32,
        politeness_delay: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            seeds,
            page_ceiling: page_ceiling.max(1),
            current_page: 1,
            politeness_delay,
        }
    }

    /// Moves the page counter to `page`; the counter never goes backwards
    pub fn advance_to(&mut self, page: u32) {
        self.current_page = self.current_page.max(page);
    }

    /// Returns true once the page counter sits on the ceiling
    pub fn at_ceiling(&self) -> bool {
        self.current_page >= self.page_ceiling
    }
}
