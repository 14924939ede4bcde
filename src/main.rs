//! Sumi-Trawl main entry point
//!
//! This is the command-line interface for the Sumi-Trawl crawl engine.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_trawl::config::{load_config_with_hash, Config};
use sumi_trawl::container::ContainerSignal;
use sumi_trawl::crawler::Crawler;
use sumi_trawl::output::{load_statistics, print_statistics};
use sumi_trawl::service::{DataService, SqliteStorage, UrlQueueService};
use tracing_subscriber::EnvFilter;

/// Sumi-Trawl: a concurrent crawl engine
///
/// Sumi-Trawl crawls web sites and local file trees with a pool of workers
/// sharing one URL queue, and stores every processed result per session.
#[derive(Parser, Debug)]
#[command(name = "sumi-trawl")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent crawl engine", long_about = None)]
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

    /// Use this session id instead of a generated one
    #[arg(long, value_name = "ID")]
    session: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "cleanup"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "cleanup"])]
    stats: bool,

    /// Delete the queue and results of a session and exit
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats"])]
    cleanup: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config, cli.session.as_deref()).await
    } else if let Some(session_id) = cli.cleanup {
        handle_cleanup(&config, &session_id).await
    } else {
        handle_crawl(&config, cli.session).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_trawl=info,warn"),
            1 => EnvFilter::new("sumi_trawl=debug,info"),
            2 => EnvFilter::new("sumi_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<SqliteStorage>> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    Ok(Arc::new(storage))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Trawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.num_of_thread);
    println!(
        "  Max thread check count: {}",
        config.crawler.max_thread_check_count
    );
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max access count: {}", config.crawler.max_access_count);
    println!("  robots.txt: {}", config.crawler.robots_txt_enabled);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nIntervals:");
    println!(
        "  Before processing: {}ms",
        config.interval.delay_millis_before_processing
    );
    println!(
        "  After processing: {}ms",
        config.interval.delay_millis_after_processing
    );
    println!(
        "  No URL in queue: {}ms",
        config.interval.delay_millis_at_no_url_in_queue
    );
    println!(
        "  Waiting for new URL: {}ms",
        config.interval.delay_millis_for_waiting_new_url
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.output.database_path);

    println!("\nFilters:");
    println!("  Scope to seeds: {}", config.filter.scope_to_seeds);
    for pattern in &config.filter.include {
        println!("  + {}", pattern);
    }
    for pattern in &config.filter.exclude {
        println!("  - {}", pattern);
    }

    println!("\nRules ({}):", config.rules.len());
    for rule in &config.rules {
        println!(
            "  - {} ({:?} / {:?}{})",
            rule.rule_id,
            rule.processor,
            rule.transformer,
            if rule.default_rule { ", default" } else { "" }
        );
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
async fn handle_stats(config: &Config, session: Option<&str>) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let sessions = match session {
        Some(session_id) => vec![session_id.to_string()],
        None => storage.sessions()?,
    };

    if sessions.is_empty() {
        println!("No sessions stored");
        return Ok(());
    }

    for session_id in sessions {
        let stats = load_statistics(&session_id, storage.as_ref(), storage.as_ref()).await?;
        print_statistics(&stats);
    }

    Ok(())
}

/// Handles the --cleanup mode: drops one session's queue and results
async fn handle_cleanup(config: &Config, session_id: &str) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    UrlQueueService::delete(storage.as_ref(), session_id).await?;
    DataService::delete(storage.as_ref(), session_id).await?;
    println!("✓ Session {} removed", session_id);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, session: Option<String>) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let signal = Arc::new(ContainerSignal::new());

    let url_queue: Arc<dyn UrlQueueService> = storage.clone();
    let data_service: Arc<dyn DataService> = storage.clone();
    let crawler = Crawler::from_config(config, url_queue, data_service, signal.clone()).await?;
    if let Some(session_id) = session {
        crawler.set_session_id(session_id);
    }

    tracing::info!(
        "Crawling {} seeds with {} workers",
        config.seeds.len(),
        config.crawler.num_of_thread
    );

    let interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight URLs");
            interrupt.shutdown();
        }
    });

    let session_id = crawler.execute().await?;
    if crawler.is_background() {
        crawler.await_termination(None).await;
    }

    println!("Session: {}\n", session_id);
    let stats = load_statistics(&session_id, storage.as_ref(), storage.as_ref()).await?;
    print_statistics(&stats);

    Ok(())
}
