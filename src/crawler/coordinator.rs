//! Crawler coordinator - the per-job crawl loop and whole-run orchestration
//!
//! This module contains the loop that drives one job, including:
//! - Dequeuing requests and honouring job and host politeness delays
//! - Fetching with the retry policy for transient failures
//! - Resolving, extracting and paginating each document
//! - Feeding records into the dataset's sink
//!
//! and `run_crawl`, which fans jobs out as tokio tasks, then finalizes and
//! writes every dataset.

use crate::config::{Config, JobConfig};
use crate::crawler::{Document, Fetcher, PaginationController, Scheduler, SourceResolver};
use crate::extract::{Extraction, Extractor};
use crate::output::{
    CrawlStatistics, FinalizedOutput, JsonDirectoryWriter, MergeSink, OutputHandler, SharedSink,
};
use crate::state::{
    CrawlJob, HostBudget, PageOutcome, PaginationState, RequestDescriptor, RequestKind,
    ResponseEnvelope,
};
use crate::storage::{open_store, RunStatus, SharedStore};
use crate::url::{host_of, is_allowed_domain};
use crate::{ConfigError, GleanError, Result, TransportError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What one job did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: String,
    pub dataset: String,

    /// Listing pages processed
    pub pages: u32,

    /// Drill-down documents processed
    pub details: u32,

    /// Records emitted, listing and detail, before merging
    pub records: usize,

    /// Item scopes skipped for lacking identifying data
    pub skipped: usize,

    pub outcomes: BTreeMap<PageOutcome, u32>,

    /// Requests dequeued from the scheduler
    pub requests_issued: u64,

    /// The job stopped because cancellation was requested
    pub cancelled: bool,

    /// Highest listing page reached
    pub last_page: u32,
}

impl JobReport {
    pub fn new(job_id: &str, dataset: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            dataset: dataset.to_string(),
            pages: 0,
            details: 0,
            records: 0,
            skipped: 0,
            outcomes: BTreeMap::new(),
            requests_issued: 0,
            cancelled: false,
            last_page: 0,
        }
    }

    pub fn record_outcome(&mut self, outcome: PageOutcome) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
    }

    /// Number of pages that ended with `outcome`
    pub fn outcome_count(&self, outcome: PageOutcome) -> u32 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

/// A processed document, ready to be fed into the sink and the queue
struct Processed {
    extraction: Extraction,
    pagination: PaginationState,
}

/// Drives crawl jobs
///
/// Cloning is cheap: clones share the HTTP client, the per-host politeness
/// budget and the cancellation flag, so one clone can be moved into each job
/// task.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Fetcher,
    resolver: SourceResolver,
    hosts: HostBudget,
    cancelled: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a coordinator with its own cancellation flag
    pub fn new(config: Config) -> Result<Self> {
        Self::with_cancel_flag(config, Arc::new(AtomicBool::new(false)))
    }

    /// Creates a coordinator that stops scheduling once `cancelled` is set
    pub fn with_cancel_flag(config: Config, cancelled: Arc<AtomicBool>) -> Result<Self> {
        let fetcher = Fetcher::new(&config.crawler)?;
        let resolver = SourceResolver::from_config(&config.crawler);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            resolver,
            hosts: HostBudget::new(),
            cancelled,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The flag every job checks between fetch cycles
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs one job to completion, feeding its records into `sink`
    ///
    /// Page-level failures never end up here: they are logged, tallied in the
    /// report and end that page's contribution. Only an unknown job or rules
    /// that fail to compile return an error.
    pub async fn run_job(&self, job_id: &str, sink: SharedSink) -> Result<JobReport> {
        let job_config = self.config.job(job_id).ok_or_else(|| {
            ConfigError::Validation(format!("Unknown job '{}'", job_id))
        })?;

        let extractor = Extractor::from_job(job_config)?;
        let pagination = PaginationController::from_job(job_config)?;
        let politeness = Duration::from_millis(job_config.delay_ms);

        let seeds = job_config
            .seeds
            .iter()
            .map(|seed| RequestDescriptor::listing(seed.clone(), 1))
            .collect();
        let job = CrawlJob::new(job_id, seeds, pagination.ceiling(), politeness);
        let mut scheduler = Scheduler::new(job, self.cancel_flag());

        let mut report = JobReport::new(job_id, &job_config.dataset);
        let mut listing_records = 0usize;

        info!(
            "Starting job {} ({} seeds, ceiling {})",
            job_id,
            job_config.seeds.len(),
            pagination.ceiling()
        );

        while let Some(request) = scheduler.next() {
            if !is_allowed_domain(&job_config.allowed_domains, request.url()) {
                debug!("Skipping offsite request {}", request.url());
                report.record_outcome(PageOutcome::Offsite);
                scheduler.complete(Instant::now());
                continue;
            }

            let now = Instant::now();
            let ready = now + scheduler.delay_before_fetch(now);
            let wait = match host_of(request.url()) {
                Some(host) => {
                    let host_wait = self.hosts.reserve(&host, politeness, ready);
                    (ready + host_wait).saturating_duration_since(now)
                }
                None => ready.saturating_duration_since(now),
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            let fetched = if scheduler.is_cancelled() {
                Err(TransportError::Cancelled {
                    url: request.url().to_string(),
                })
            } else {
                self.fetch_with_retry(&request).await
            };
            scheduler.complete(Instant::now());

            let envelope = match fetched {
                Ok(envelope) => envelope,
                Err(TransportError::Cancelled { url }) => {
                    info!("Job {} cancelled before fetching {}", job_id, url);
                    report.record_outcome(PageOutcome::Cancelled);
                    break;
                }
                Err(e) => {
                    warn!("Job {}: {}", job_id, e);
                    report.record_outcome(PageOutcome::TransportFailed);
                    continue;
                }
            };

            let processed = match self.process(
                job_config,
                &extractor,
                &pagination,
                &envelope,
                listing_records,
            ) {
                Ok(processed) => processed,
                Err(e) => {
                    warn!("Job {}: {}", job_id, e);
                    report.record_outcome(PageOutcome::Malformed);
                    continue;
                }
            };
            report.record_outcome(PageOutcome::Extracted);

            let Processed {
                extraction,
                pagination: state,
            } = processed;
            let emitted = extraction.records.len();

            match request.kind() {
                RequestKind::Listing => {
                    report.pages += 1;
                    listing_records += emitted;
                    scheduler.advance_to(request.page());
                    info!(
                        "Job {} page {}: {} records, {} follow-ups from {}",
                        job_id,
                        request.page(),
                        emitted,
                        extraction.follow_ups.len(),
                        envelope.final_url
                    );
                }
                RequestKind::Detail => {
                    report.details += 1;
                    debug!("Job {} detail {}: {} records", job_id, envelope.final_url, emitted);
                }
            }
            report.records += emitted;
            report.skipped += extraction.skipped;

            {
                let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
                for record in extraction.records {
                    if let Err(e) = sink.ingest(record) {
                        warn!("Failed to persist record for dataset {}: {}", sink.dataset(), e);
                    }
                }
            }

            for follow_up in extraction.follow_ups {
                scheduler.enqueue(follow_up);
            }
            if let Some(next) = state.next {
                scheduler.enqueue(next);
            }
        }

        report.requests_issued = scheduler.issued();
        report.cancelled = scheduler.is_cancelled();
        report.last_page = if report.pages > 0 {
            scheduler.job().current_page
        } else {
            0
        };

        info!(
            "Finished job {}: {} listing pages, {} details, {} records{}",
            job_id,
            report.pages,
            report.details,
            report.records,
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    /// Runs several jobs concurrently, one tokio task each
    ///
    /// A job that fails to start, or whose task panics, is logged and left
    /// out of the returned reports; the other jobs are unaffected.
    pub async fn run_jobs(
        &self,
        job_ids: &[String],
        sinks: &HashMap<String, SharedSink>,
    ) -> Vec<JobReport> {
        let mut handles = Vec::with_capacity(job_ids.len());

        for job_id in job_ids {
            let Some(job) = self.config.job(job_id) else {
                error!("Unknown job '{}'", job_id);
                continue;
            };
            let Some(sink) = sinks.get(&job.dataset) else {
                error!("No sink for dataset '{}' of job {}", job.dataset, job_id);
                continue;
            };

            let coordinator = self.clone();
            let sink = Arc::clone(sink);
            let id = job_id.clone();
            let handle =
                tokio::spawn(async move { coordinator.run_job(&id, sink).await });
            handles.push((job_id.clone(), handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (job_id, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => error!("Job {} failed: {}", job_id, e),
                Err(e) => error!("Job {} task panicked: {}", job_id, e),
            }
        }

        reports
    }

    /// Fetches a request, retrying transient failures with exponential backoff
    async fn fetch_with_retry(
        &self,
        request: &RequestDescriptor,
    ) -> std::result::Result<ResponseEnvelope, TransportError> {
        let max_retries = self.config.crawler.max_retries;
        let mut attempt = 0;

        loop {
            match self.fetcher.fetch(request.clone()).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    if self.is_cancelled() {
                        return Err(TransportError::Cancelled {
                            url: request.url().to_string(),
                        });
                    }

                    attempt += 1;
                    let backoff = retry_backoff(self.config.crawler.retry_backoff_ms, attempt);
                    warn!(
                        "{} (retry {}/{} in {:?})",
                        e, attempt, max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolves, extracts and paginates one envelope
    ///
    /// Synchronous on purpose: the decoded document is not `Send` and must be
    /// dropped before the job loop awaits again.
    fn process(
        &self,
        job: &JobConfig,
        extractor: &Extractor,
        pagination: &PaginationController,
        envelope: &ResponseEnvelope,
        listing_records: usize,
    ) -> Result<Processed> {
        let document: Document = self.resolver.resolve(envelope)?;
        let mut extraction = extractor.extract(&document, envelope);

        if envelope.request.kind() == RequestKind::Detail {
            return Ok(Processed {
                extraction,
                pagination: PaginationState::done(envelope.request.page()),
            });
        }

        if let Some(max) = job.max_records {
            extraction.truncate(max.saturating_sub(listing_records));
        }

        let emitted = listing_records + extraction.records.len();
        let state = pagination.next_page(&document, envelope, emitted);

        Ok(Processed {
            extraction,
            pagination: state,
        })
    }
}

/// Delay before retry `attempt` (1-based): `base`, `2 * base`, `4 * base`, ...
pub fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exponent))
}

/// Which jobs to run and how to treat the durable store
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Job ids to run; empty runs every configured job
    pub jobs: Vec<String>,

    /// Clear the durable store before crawling instead of resuming from it
    pub fresh: bool,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Run id in the durable store, when one is configured
    pub run_id: Option<i64>,
    pub reports: Vec<JobReport>,
    pub outputs: Vec<FinalizedOutput>,
    pub written: Vec<PathBuf>,
    pub statistics: CrawlStatistics,
}

/// Runs the selected jobs and writes every dataset they feed
///
/// This function orchestrates the entire crawl:
///
/// 1. Open the durable store (if configured) and record a new run
/// 2. Build one sink per dataset, restored from the store unless `fresh`
/// 3. Run the jobs concurrently, sharing the per-host politeness budget
/// 4. Finalize and write each dataset into `output.directory`
/// 5. Mark the run completed, or interrupted if it was cancelled
///
/// # Example
///
/// ```no_run
/// use gleaner::config::load_config_with_hash;
/// use gleaner::crawler::{run_crawl, CrawlOptions};
/// use std::path::Path;
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("gleaner.toml"))?;
/// let cancelled = Arc::new(AtomicBool::new(false));
/// run_crawl(config, &hash, CrawlOptions::default(), cancelled).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    options: CrawlOptions,
    cancelled: Arc<AtomicBool>,
) -> Result<CrawlOutcome> {
    let job_ids = select_jobs(&config, &options.jobs)?;
    let store = config
        .output
        .database_path
        .as_deref()
        .map(|path| open_store(Path::new(path)))
        .transpose()?;

    let run_id = match &store {
        Some(store) => {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            if options.fresh {
                info!("Clearing durable store");
                store.clear_records()?;
            }
            Some(store.create_run(config_hash)?)
        }
        None => None,
    };

    let sinks = build_sinks(&config, &job_ids, store.as_ref(), options.fresh)?;

    let coordinator = Coordinator::with_cancel_flag(config, Arc::clone(&cancelled))?;
    let reports = coordinator.run_jobs(&job_ids, &sinks).await;

    let mut statistics = CrawlStatistics::from_reports(&reports);
    let (outputs, written) = write_datasets(coordinator.config(), &sinks, &mut statistics)?;

    if let (Some(store), Some(run_id)) = (&store, run_id) {
        let status = if cancelled.load(Ordering::SeqCst) {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_run(run_id, status)?;
    }

    Ok(CrawlOutcome {
        run_id,
        reports,
        outputs,
        written,
        statistics,
    })
}

/// Rebuilds every dataset from the durable store without crawling
pub fn export_from_store(config: &Config) -> Result<CrawlOutcome> {
    let path = config.output.database_path.as_deref().ok_or_else(|| {
        ConfigError::Validation("Export requires output.database-path".to_string())
    })?;
    let store = open_store(Path::new(path))?;

    let mut sinks = HashMap::new();
    for dataset in &config.datasets {
        let sink = MergeSink::restore(dataset, Arc::clone(&store))?;
        sinks.insert(dataset.name.clone(), sink.shared());
    }

    let mut statistics = CrawlStatistics::default();
    let (outputs, written) = write_datasets(config, &sinks, &mut statistics)?;

    Ok(CrawlOutcome {
        run_id: None,
        reports: Vec::new(),
        outputs,
        written,
        statistics,
    })
}

/// Resolves the requested job ids, defaulting to every configured job
fn select_jobs(config: &Config, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(config.jobs.iter().map(|j| j.id.clone()).collect());
    }

    for id in requested {
        if config.job(id).is_none() {
            return Err(GleanError::Config(ConfigError::Validation(format!(
                "Unknown job '{}'",
                id
            ))));
        }
    }
    Ok(requested.to_vec())
}

/// One sink per dataset fed by the selected jobs
fn build_sinks(
    config: &Config,
    job_ids: &[String],
    store: Option<&SharedStore>,
    fresh: bool,
) -> Result<HashMap<String, SharedSink>> {
    let mut sinks = HashMap::new();

    for job in job_ids.iter().filter_map(|id| config.job(id)) {
        if sinks.contains_key(&job.dataset) {
            continue;
        }
        let dataset = config.dataset(&job.dataset).ok_or_else(|| {
            ConfigError::Validation(format!("Undeclared dataset '{}'", job.dataset))
        })?;

        let sink = match store {
            Some(store) if !fresh => MergeSink::restore(dataset, Arc::clone(store))?,
            Some(store) => MergeSink::new(dataset).with_store(Arc::clone(store)),
            None => MergeSink::new(dataset),
        };
        sinks.insert(dataset.name.clone(), sink.shared());
    }

    Ok(sinks)
}

/// Finalizes every sink and writes it, in dataset name order
fn write_datasets(
    config: &Config,
    sinks: &HashMap<String, SharedSink>,
    statistics: &mut CrawlStatistics,
) -> Result<(Vec<FinalizedOutput>, Vec<PathBuf>)> {
    let writer = JsonDirectoryWriter::new(&config.output.directory);

    let mut names: Vec<&String> = sinks.keys().collect();
    names.sort();

    let mut outputs = Vec::with_capacity(names.len());
    let mut written = Vec::new();
    for name in names {
        let output = sinks[name]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finalize();

        statistics.record_dataset(name, output.records.len());
        written.extend(writer.write(&output)?);
        outputs.push(output);
    }

    Ok((outputs, written))
}
