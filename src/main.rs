//! Reply-Harvest main entry point
//!
//! This is the command-line interface for the incremental reply collector.

use clap::Parser;
use reply_harvest::config::{load_config_with_hash, Config};
use reply_harvest::crawler::{run_harvest, JobOutcome};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Reply-Harvest: an incremental reply collector
///
/// Reply-Harvest searches for replies and quote tweets of configured target
/// tweets, stores them, and remembers how far it got so the next invocation
/// only collects what is new.
#[derive(Parser, Debug)]
#[command(name = "reply-harvest")]
#[command(version)]
#[command(about = "An incremental reply collector", long_about = None)]
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

    /// Validate config and list the jobs that would run without harvesting
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Write a markdown summary of collected replies and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reply_harvest=info,warn"),
            1 => EnvFilter::new("reply_harvest=debug,info"),
            2 => EnvFilter::new("reply_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and lists the jobs
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Reply-Harvest Dry Run ===\n");

    println!("Search:");
    println!("  API: {}", config.search.api_base_url);
    println!("  Token variable: {}", config.search.bearer_token_env);
    println!("  Page size: {}", config.search.page_size);

    println!("\nHarvest:");
    println!("  Time budget: {}s", config.harvest.time_budget_secs);
    println!("  Safety margin: {}s", config.harvest.safety_margin_secs);
    println!("  Retry delay: {}ms", config.harvest.retry_delay_ms);
    println!(
        "  Max concurrent targets: {}",
        config.harvest.max_concurrent_targets
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    let jobs = config.jobs()?;
    println!("\nJobs ({}):", jobs.len());
    for (target, kind) in &jobs {
        println!("  - {} {}: q={}", target, kind, kind.query(target));
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use reply_harvest::output::{load_statistics, print_statistics};
    use reply_harvest::storage::open_storage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use reply_harvest::output::{generate_markdown_summary, generate_summary};
    use reply_harvest::storage::open_storage;
    use std::path::Path;

    println!("=== Exporting Harvest Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;

    tracing::info!("Loading replies from database...");
    let summary = generate_summary(&storage)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Targets: {}", config.targets.len());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let report = match run_harvest(config, config_hash, cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    for job in &report.jobs {
        match &job.outcome {
            JobOutcome::Finished { summary, .. } => println!(
                "{} {}: {} new reply(ies), {:?} after {} page(s)",
                job.target, job.kind, job.stored, summary.reason, summary.pages
            ),
            JobOutcome::Cancelled => println!("{} {}: cancelled", job.target, job.kind),
            JobOutcome::Failed(e) => println!("{} {}: failed: {}", job.target, job.kind, e),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(format!("{} of {} job(s) did not finish", failed, report.jobs.len()).into());
    }

    tracing::info!("Harvest completed successfully");
    Ok(())
}
