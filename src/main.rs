//! Gugel main entry point
//!
//! This is the command-line interface for the Gugel crawler and index updater.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gugel::access::AccessCoordinator;
use gugel::config::{load_config_with_hash, Config, SiteConfig};
use gugel::crawler::CrawlEngine;
use gugel::daemon::{Schedule, UpdateDaemon};
use gugel::stats::{load_statistics, print_statistics};
use gugel::GugelError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gugel: a single-server crawler that keeps a text index fresh
///
/// Gugel crawls one server at a time, politely and depth-first, stores what
/// it finds in a per-site index and re-fetches stale pages on a daily
/// schedule.
#[derive(Parser, Debug)]
#[command(name = "gugel")]
#[command(version)]
#[command(about = "A polite single-server crawler and index updater", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site from its start URL and extra seeds
    Crawl {
        /// Site name from the configuration
        site: String,
    },

    /// Run the update daemon once for a site
    Update {
        /// Site name from the configuration
        site: String,
    },

    /// Run the update daemon on its daily schedule
    Daemon {
        /// Site name from the configuration
        site: String,

        /// Run once at start instead of daily
        #[arg(long)]
        once: bool,
    },

    /// Show statistics for one or all sites
    Stats {
        /// Site name; all sites if omitted
        site: Option<String>,
    },

    /// Validate config and show what would be crawled
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context(format!("invalid configuration {}", cli.config.display()));
        }
    };

    // One coordinator for every index user in this process
    let coordinator = AccessCoordinator::start();

    let result = match cli.command {
        Command::Crawl { site } => handle_crawl(&config, find_site(&config, &site)?, &coordinator).await,
        Command::Update { site } => {
            handle_daemon(&config, find_site(&config, &site)?, &coordinator, true).await
        }
        Command::Daemon { site, once } => {
            handle_daemon(&config, find_site(&config, &site)?, &coordinator, once).await
        }
        Command::Stats { site } => handle_stats(&config, site.as_deref(), &coordinator).await,
        Command::Validate => {
            handle_validate(&config);
            Ok(())
        }
    };

    coordinator.shutdown();
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gugel=info,warn"),
            1 => EnvFilter::new("gugel=debug,info"),
            2 => EnvFilter::new("gugel=trace,debug"),
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

fn find_site<'a>(config: &'a Config, name: &str) -> Result<&'a SiteConfig> {
    config
        .site(name)
        .ok_or_else(|| GugelError::UnknownSite(name.to_string()).into())
}

/// Handles the validate command: shows the configuration summary
fn handle_validate(config: &Config) {
    println!("=== Gugel Configuration ===\n");

    println!("Crawler Configuration:");
    println!("  Default timeout: {}ms", config.crawler.default_timeout_ms);
    println!(
        "  Timeout step / ceiling: {}ms / {}ms",
        config.crawler.timeout_step_ms, config.crawler.timeout_ceiling_ms
    );
    println!("  Max fetch attempts: {}", config.crawler.max_fetch_attempts);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Max depth: {}", config.crawler.max_depth);

    println!("\nUpdate Daemon:");
    println!("  Limit per run: {}", config.update.limit);
    println!("  Stale after: {} days", config.update.stale_age_days);
    println!(
        "  Forget slow / rate limited after: {} / {} days",
        config.update.slow_forget_days, config.update.rate_limited_forget_days
    );
    println!("  Runs daily at: {} UTC", config.update.run_at);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Crawler state: {}", config.storage.crawler_dir.display());
    println!("  Indexes: {}", config.storage.index_dir.display());

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({} seeds)", site.name, site.seeds.len() + 1);
        for seed in site.all_seeds() {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} sites from {} seed URLs",
        config.sites.len(),
        config.sites.iter().map(|s| s.seeds.len() + 1).sum::<usize>()
    );
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, site: &SiteConfig, coordinator: &AccessCoordinator) -> Result<()> {
    let seeds = site.all_seeds();
    tracing::info!("Crawling site '{}' from {} seed URLs", site.name, seeds.len());

    let mut engine = CrawlEngine::for_site(config, site, coordinator.handle())?;
    match engine.crawl_all(&seeds).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed: {} fetched, {} indexed, {} not indexable, {} left for the update daemon",
                report.fetched,
                report.flushed,
                report.skipped,
                report.deferred
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the update and daemon commands
async fn handle_daemon(
    config: &Config,
    site: &SiteConfig,
    coordinator: &AccessCoordinator,
    once: bool,
) -> Result<()> {
    let schedule = Schedule::from_config(&config.update, once)?;
    tracing::info!("Starting update daemon for '{}' ({:?})", site.name, schedule);

    let mut daemon = UpdateDaemon::for_site(config, site, coordinator.handle())?;
    daemon.run_scheduled(schedule).await?;
    Ok(())
}

/// Handles the stats command
async fn handle_stats(
    config: &Config,
    site: Option<&str>,
    coordinator: &AccessCoordinator,
) -> Result<()> {
    let sites: Vec<&SiteConfig> = match site {
        Some(name) => vec![find_site(config, name)?],
        None => config.sites.iter().collect(),
    };

    let access = coordinator.handle();
    for site in sites {
        let stats = load_statistics(config, site, &access)
            .await
            .with_context(|| format!("cannot read statistics of '{}'", site.name))?;
        print_statistics(&stats);
    }

    Ok(())
}
