use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Politeness bookkeeping for one target host
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of fetches reserved against this host
    pub request_count: u32,

    /// Start time of the most recently reserved fetch
    pub last_request_time: Option<Instant>,
}

impl HostState {
    /// Creates a HostState with no recorded requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + min_delay;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Records that a request will start at `at`
    pub fn record_request(&mut self, at: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(match self.last_request_time {
            Some(last) if last > at => last,
            _ => at,
        });
    }
}

/// Per-host politeness budget shared by concurrently running jobs
///
/// Cloning yields another handle onto the same budget. Each reservation pushes
/// the host's next free slot forward, so two jobs hitting one host are spaced
/// out even though they never share any other state.
#[derive(Debug, Clone, Default)]
pub struct HostBudget {
    hosts: Arc<Mutex<HashMap<String, HostState>>>,
}

impl HostBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next slot on `host` and returns how long to wait for it
    pub fn reserve(&self, host: &str, min_delay: Duration, now: Instant) -> Duration {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let state = hosts.entry(host.to_string()).or_insert_with(HostState::new);

        let wait = state
            .time_until_next_request(min_delay, now)
            .unwrap_or(Duration::ZERO);
        state.record_request(now + wait);
        wait
    }

    /// Snapshot of a host's state
    pub fn get(&self, host: &str) -> Option<HostState> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts.get(host).cloned()
    }
}
