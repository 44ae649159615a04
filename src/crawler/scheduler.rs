//! Fetch scheduler: one outstanding request per job, strict FIFO
//!
//! This module handles:
//! - The job's pending request queue (seeds first, then discoveries in order)
//! - The single in-flight slot
//! - The politeness delay measured from the end of the previous fetch
//! - Cancellation between fetch cycles

use crate::state::{CrawlJob, RequestDescriptor};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Owns a `CrawlJob` for the lifetime of its pagination loop
///
/// The scheduler never retries and never reorders. A failed fetch is the
/// caller's to handle; the scheduler only needs to hear that it finished.
#[derive(Debug)]
pub struct Scheduler {
    job: CrawlJob,

    /// Pending requests, seeds first
    queue: VecDeque<RequestDescriptor>,

    /// True between `next` and `complete`
    in_flight: bool,

    /// When the previous fetch finished
    last_completed: Option<Instant>,

    /// Requests handed out so far (diagnostics only)
    issued: u64,

    cancelled: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a scheduler whose queue starts with the job's seeds
    ///
    /// # Arguments
    ///
    /// * `job` - The job to drive
    /// * `cancelled` - Flag checked before every dequeue; may be shared across jobs
    pub fn new(job: CrawlJob, cancelled: Arc<AtomicBool>) -> Self {
        let queue = job.seeds.iter().cloned().collect();

        Self {
            job,
            queue,
            in_flight: false,
            last_completed: None,
            issued: 0,
            cancelled,
        }
    }

    pub fn job(&self) -> &CrawlJob {
        &self.job
    }

    /// Dequeues the next request
    ///
    /// Returns `None` when the queue is empty, the job was cancelled, or a
    /// request is already in flight.
    pub fn next(&mut self) -> Option<RequestDescriptor> {
        if self.in_flight || self.is_cancelled() {
            return None;
        }

        let request = self.queue.pop_front()?;
        self.in_flight = true;
        self.issued += 1;
        Some(request)
    }

    /// Minimum wait before the dequeued request may be fetched
    pub fn delay_before_fetch(&self, now: Instant) -> Duration {
        match self.last_completed {
            Some(done) => (done + self.job.politeness_delay).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Marks the in-flight fetch finished, successfully or not
    pub fn complete(&mut self, at: Instant) {
        self.in_flight = false;
        self.last_completed = Some(at);
    }

    /// Appends a discovered request to the back of the queue
    pub fn enqueue(&mut self, request: RequestDescriptor) {
        self.queue.push_back(request);
    }

    /// Records that the job has reached listing page `page`
    pub fn advance_to(&mut self, page: u32) {
        self.job.advance_to(page);
    }

    /// Stops all further scheduling for every holder of the flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of requests waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of requests handed out so far
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn create_test_scheduler(delay_ms: u64) -> Scheduler {
        let job = CrawlJob::new(
            "test",
            vec![
                RequestDescriptor::listing("https://example.com/a", 1),
                RequestDescriptor::listing("https://example.com/b", 1),
            ],
            5,
            Duration::from_millis(delay_ms),
        );
        Scheduler::new(job, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_seeds_in_order() {
        let mut scheduler = create_test_scheduler(0);

        let first = scheduler.next().unwrap();
        assert_eq!(first.url(), "https://example.com/a");
        scheduler.complete(Instant::now());

        let second = scheduler.next().unwrap();
        assert_eq!(second.url(), "https://example.com/b");
        scheduler.complete(Instant::now());

        assert!(scheduler.next().is_none());
        assert_eq!(scheduler.issued(), 2);
    }

    #[test]
    fn test_one_request_in_flight() {
        let mut scheduler = create_test_scheduler(0);

        assert!(scheduler.next().is_some());
        assert!(scheduler.next().is_none());
        assert_eq!(scheduler.pending(), 1);

        scheduler.complete(Instant::now());
        assert!(scheduler.next().is_some());
    }

    #[test]
    fn test_discoveries_after_seeds_fifo() {
        let mut scheduler = create_test_scheduler(0);
        let _ = scheduler.next();
        scheduler.enqueue(RequestDescriptor::detail(
            "https://example.com/d/1",
            1,
            BTreeMap::new(),
        ));
        scheduler.enqueue(RequestDescriptor::listing("https://example.com/a?page=2", 2));
        scheduler.complete(Instant::now());

        let order: Vec<String> = std::iter::from_fn(|| {
            let next = scheduler.next();
            scheduler.complete(Instant::now());
            next
        })
        .map(|r| r.url().to_string())
        .collect();

        assert_eq!(
            order,
            vec![
                "https://example.com/b",
                "https://example.com/d/1",
                "https://example.com/a?page=2"
            ]
        );
    }

    #[test]
    fn test_delay_before_fetch() {
        let mut scheduler = create_test_scheduler(1000);
        let start = Instant::now();

        assert_eq!(scheduler.delay_before_fetch(start), Duration::ZERO);

        let _ = scheduler.next();
        scheduler.complete(start);

        assert_eq!(
            scheduler.delay_before_fetch(start + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        assert_eq!(
            scheduler.delay_before_fetch(start + Duration::from_millis(1500)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_cancel_stops_scheduling() {
        let mut scheduler = create_test_scheduler(0);
        scheduler.cancel();
        assert!(scheduler.is_cancelled());
        assert!(scheduler.next().is_none());
        assert_eq!(scheduler.pending(), 2);
    }

    #[test]
    fn test_shared_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let job = CrawlJob::new(
            "shared",
            vec![RequestDescriptor::listing("https://example.com/", 1)],
            1,
            Duration::ZERO,
        );
        let mut scheduler = Scheduler::new(job, Arc::clone(&flag));

        flag.store(true, Ordering::SeqCst);
        assert!(scheduler.next().is_none());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut scheduler = create_test_scheduler(0);
        scheduler.advance_to(3);
        scheduler.advance_to(2);
        assert_eq!(scheduler.job().current_page, 3);
    }
}
