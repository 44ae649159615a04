//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner crawler.

use anyhow::{bail, Context};
use clap::Parser;
use gleaner::config::{load_config_with_hash, Config, EntityKeyConfig};
use gleaner::crawler::{export_from_store, run_crawl, CrawlOptions, CrawlOutcome};
use gleaner::output::print_statistics;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Gleaner: a configurable extraction-and-pagination crawler
///
/// Gleaner runs the crawl jobs declared in a TOML file, extracts records
/// from HTML listings and JSON APIs, follows pagination up to each job's page
/// ceiling and writes merged, grouped JSON datasets.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "A configurable extraction-and-pagination crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run only these jobs (repeatable); all jobs by default
    #[arg(long = "job", value_name = "ID")]
    jobs: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["export", "fresh"])]
    dry_run: bool,

    /// Rebuild the datasets from the durable store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh"])]
    export: bool,

    /// Clear the durable store before crawling
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.jobs)
    } else if cli.export {
        handle_export(&config)
    } else {
        let options = CrawlOptions {
            jobs: cli.jobs,
            fresh: cli.fresh,
        };
        handle_crawl(config, &config_hash, options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG`, when set, takes precedence over the flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "gleaner=info,warn",
            1 => "gleaner=debug,info",
            2 => "gleaner=trace,debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, selected: &[String]) -> anyhow::Result<()> {
    println!("=== Gleaner Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    println!(
        "  Retries: {} (backoff {}ms)",
        config.crawler.max_retries, config.crawler.retry_backoff_ms
    );

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    match &config.output.database_path {
        Some(path) => println!("  Database: {}", path),
        None => println!("  Database: (none)"),
    }

    println!("\nDatasets ({}):", config.datasets.len());
    for dataset in &config.datasets {
        if dataset.group_by.is_empty() {
            println!("  - {}", dataset.name);
        } else {
            println!("  - {} (grouped by {})", dataset.name, dataset.group_by.join(", "));
        }
    }

    let jobs: Vec<_> = config
        .jobs
        .iter()
        .filter(|job| selected.is_empty() || selected.contains(&job.id))
        .collect();
    for id in selected {
        if config.job(id).is_none() {
            bail!("Unknown job '{}'", id);
        }
    }

    println!("\nJobs ({}):", jobs.len());
    for job in &jobs {
        println!(
            "  - {} -> {} (max {} pages, {}ms delay, {} fields{})",
            job.id,
            job.dataset,
            job.max_pages,
            job.delay_ms,
            job.fields.len(),
            if job.detail.is_some() { ", drill-down" } else { "" }
        );
        println!("    key: {}", describe_entity_key(&job.entity_key));
        for seed in &job.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        jobs.iter().map(|job| job.seeds.len()).sum::<usize>()
    );

    Ok(())
}

fn describe_entity_key(key: &EntityKeyConfig) -> String {
    match key {
        EntityKeyConfig::Segment { field, segment } => {
            format!("segment {} from the end of {}", segment, field)
        }
        EntityKeyConfig::Field { field } => format!("field {}", field),
        EntityKeyConfig::Hash { hash } => format!("hash of {}", hash.join(", ")),
    }
}

/// Handles the --export mode: rewrites every dataset from the durable store
fn handle_export(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Datasets ===\n");

    let outcome = export_from_store(config)?;
    report_written(&outcome);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, options: CrawlOptions) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh crawl (clearing stored records)");
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            flag.store(true, Ordering::SeqCst);
        }
    });

    match run_crawl(config, config_hash, options, cancelled).await {
        Ok(outcome) => {
            tracing::info!("Crawl completed");
            print_statistics(&outcome.statistics);
            println!();
            report_written(&outcome);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn report_written(outcome: &CrawlOutcome) {
    for output in &outcome.outputs {
        println!(
            "✓ {}: {} records, {} groups",
            output.dataset,
            output.records.len(),
            output.groups.len()
        );
    }
    for path in &outcome.written {
        println!("  {}", path.display());
    }
}
