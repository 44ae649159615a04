//! End-of-run statistics built from job reports

use crate::crawler::JobReport;
use crate::state::PageOutcome;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Jobs that ran
    pub jobs: usize,

    /// Requests handed to the transport, retries excluded
    pub requests_issued: u64,

    /// Listing pages processed
    pub listing_pages: u64,

    /// Drill-down documents processed
    pub detail_pages: u64,

    /// Records emitted by extraction, before merging
    pub records_emitted: u64,

    /// Item scopes skipped for missing required fields or keys
    pub items_skipped: u64,

    /// Count of pages by outcome
    pub outcomes: BTreeMap<PageOutcome, u64>,

    /// Records per dataset after merging
    pub dataset_records: BTreeMap<String, usize>,

    /// Jobs that stopped early on cancellation
    pub cancelled_jobs: Vec<String>,
}

impl CrawlStatistics {
    /// Totals the reports of every job in a run
    pub fn from_reports(reports: &[JobReport]) -> Self {
        let mut stats = Self {
            jobs: reports.len(),
            ..Self::default()
        };

        for report in reports {
            stats.requests_issued += report.requests_issued;
            stats.listing_pages += u64::from(report.pages);
            stats.detail_pages += u64::from(report.details);
            stats.records_emitted += report.records as u64;
            stats.items_skipped += report.skipped as u64;

            for (outcome, count) in &report.outcomes {
                *stats.outcomes.entry(*outcome).or_insert(0) += u64::from(*count);
            }

            if report.cancelled {
                stats.cancelled_jobs.push(report.job_id.clone());
            }
        }

        stats
    }

    /// Records the merged size of a dataset
    pub fn record_dataset(&mut self, dataset: &str, records: usize) {
        self.dataset_records.insert(dataset.to_string(), records);
    }

    /// Pages attempted, whatever their outcome
    pub fn total_pages(&self) -> u64 {
        self.outcomes.values().sum()
    }

    pub fn errors(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_error())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Jobs run: {}", stats.jobs);
    println!("  Requests issued: {}", stats.requests_issued);
    println!("  Listing pages: {}", stats.listing_pages);
    println!("  Detail pages: {}", stats.detail_pages);
    println!("  Records emitted: {}", stats.records_emitted);
    println!("  Items skipped: {}", stats.items_skipped);
    println!();

    let total = stats.total_pages();
    if total > 0 {
        println!("Pages by Outcome:");
        let mut counts: Vec<_> = stats.outcomes.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));

        for (outcome, count) in counts {
            let percentage = (*count as f64 / total as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", outcome, count, percentage);
        }
        println!();
    }

    if !stats.dataset_records.is_empty() {
        println!("Datasets:");
        for (dataset, records) in &stats.dataset_records {
            println!("  {}: {} records", dataset, records);
        }
        println!();
    }

    if !stats.cancelled_jobs.is_empty() {
        println!("Cancelled Jobs ({}):", stats.cancelled_jobs.len());
        for job in &stats.cancelled_jobs {
            println!("  - {}", job);
        }
        println!();
    }

    let succeeded = stats
        .outcomes
        .get(&PageOutcome::Extracted)
        .copied()
        .unwrap_or(0);
    let success_rate = if total > 0 {
        (succeeded as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages extracted)",
        success_rate, succeeded, total
    );
}
