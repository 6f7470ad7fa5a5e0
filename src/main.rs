//! Sports arbitrage engine entry point.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use odds_arb::arbitrage::{allocate_stakes, scan_markets, Opportunity, StakeRounding};
use odds_arb::config::{Config, VERBOSE_LOG_FILTER};
use odds_arb::metrics;
use odds_arb::odds::OddsSnapshot;

/// Cross-bookmaker sports arbitrage detection and stake allocation.
#[derive(Parser, Debug)]
#[command(name = "odds-arb")]
#[command(about = "Find sure bets across bookmakers and split a bankroll over them")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan an odds snapshot and print the opportunities found.
    Scan {
        /// Snapshot file (`{"events": [...], "odds": [...]}`).
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum profit margin as a fraction (overrides MIN_PROFIT_MARGIN).
        #[arg(long)]
        min_margin: Option<Decimal>,

        /// Maximum number of opportunities (overrides OPPORTUNITIES_LIMIT).
        #[arg(long)]
        limit: Option<usize>,

        /// Report every opportunity, not only the best per event.
        #[arg(long)]
        all_per_event: bool,
    },

    /// Compute stakes for an opportunity.
    Stakes {
        /// Opportunity file, or a scan report to pick from.
        #[arg(short, long)]
        input: PathBuf,

        /// Total bankroll to distribute.
        #[arg(short, long)]
        bankroll: Decimal,

        /// Opportunity id to pick from a scan report (default: the best).
        #[arg(long)]
        id: Option<String>,

        /// Rounding mode (overrides STAKE_ROUNDING).
        #[arg(long)]
        rounding: Option<StakeRounding>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration first so VERBOSE and RUST_LOG shape logging
    let loaded = Config::load();

    // Initialize logging (stderr, stdout carries results)
    let filter = match &loaded {
        Ok(config) => EnvFilter::new(config.log_filter(args.verbose)),
        Err(_) if args.verbose => EnvFilter::new(VERBOSE_LOG_FILTER),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(
            args.json_logs
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with((!args.json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(filter)
        .init();

    match args.command {
        Command::Scan {
            input,
            min_margin,
            limit,
            all_per_event,
        } => cmd_scan(loaded, &input, min_margin, limit, all_per_event).await,
        Command::Stakes {
            input,
            bankroll,
            id,
            rounding,
        } => cmd_stakes(loaded, &input, bankroll, id.as_deref(), rounding),
        Command::CheckConfig => cmd_check_config(loaded),
    }
}

/// Load and validate configuration, then start the metrics exporter if asked.
fn load_config(loaded: Result<Config, envy::Error>) -> anyhow::Result<Config> {
    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    metrics::init_metrics();
    if let Some(port) = config.metrics_port {
        metrics::install_prometheus(port).context("Failed to start metrics exporter")?;
    }

    Ok(config)
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Scan a snapshot file.
async fn cmd_scan(
    loaded: Result<Config, envy::Error>,
    input: &Path,
    min_margin: Option<Decimal>,
    limit: Option<usize>,
    all_per_event: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(loaded)?;

    // Override with CLI args if provided
    if let Some(margin) = min_margin {
        config.min_profit_margin = margin;
    }
    if let Some(limit) = limit {
        config.opportunities_limit = limit;
    }
    if all_per_event {
        config.best_per_event = false;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let snapshot: OddsSnapshot = serde_json::from_value(read_json(input)?)?;
    info!(rows = snapshot.odds.len(), events = snapshot.events.len(), "Snapshot loaded");

    let markets = snapshot.into_markets()?;
    let report = scan_markets(markets, config.search_params(), config.scan_options()).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Pick an opportunity from a file holding one opportunity or a scan report.
fn select_opportunity(value: serde_json::Value, id: Option<&str>) -> anyhow::Result<Opportunity> {
    let Some(list) = value.get("opportunities") else {
        return Ok(serde_json::from_value(value)?);
    };

    let opportunities: Vec<Opportunity> = serde_json::from_value(list.clone())?;
    let chosen = match id {
        Some(id) => opportunities.into_iter().find(|o| o.id == id),
        None => opportunities.into_iter().next(),
    };
    chosen.ok_or_else(|| match id {
        Some(id) => anyhow::anyhow!("No opportunity with id {}", id),
        None => anyhow::anyhow!("Report contains no opportunities"),
    })
}

/// Compute stakes for an opportunity file.
fn cmd_stakes(
    loaded: Result<Config, envy::Error>,
    input: &Path,
    bankroll: Decimal,
    id: Option<&str>,
    rounding: Option<StakeRounding>,
) -> anyhow::Result<()> {
    let config = load_config(loaded)?;
    let opportunity = select_opportunity(read_json(input)?, id)?;

    if bankroll < opportunity.min_bankroll {
        info!(
            bankroll = %bankroll,
            min_bankroll = %opportunity.min_bankroll,
            "Bankroll below the recommended minimum"
        );
    }

    let plan = allocate_stakes(
        &opportunity,
        bankroll,
        rounding.unwrap_or(config.stake_rounding),
    )?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Check configuration validity.
fn cmd_check_config(loaded: Result<Config, envy::Error>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ODDS ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match loaded {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let budget = config.budget();

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Min Profit Margin: {}", config.min_profit_margin);
    println!("  Source Policy: {}", config.source_policy());
    match config.max_quotes_per_outcome {
        Some(n) => println!("  Quotes Per Outcome: best {}", n),
        None => println!("  Quotes Per Outcome: all"),
    }
    match budget.max_evaluations {
        Some(n) => println!("  Max Evaluations: {}", n),
        None => println!("  Max Evaluations: unlimited"),
    }
    match budget.max_duration {
        Some(d) => println!("  Max Enumeration Time: {}ms", d.as_millis()),
        None => println!("  Max Enumeration Time: unlimited"),
    }
    println!("  Min Stake: {}", config.min_stake);
    println!("  Min Bankroll Floor: {}", config.min_bankroll_floor);
    println!("  Stake Rounding: {}", config.stake_rounding);
    println!("  Best Per Event: {}", config.best_per_event);
    println!("  Opportunities Limit: {}", config.opportunities_limit);
    println!("  Scan Workers: {}", config.scan_workers);
    match config.metrics_port {
        Some(port) => println!("  Metrics: http://0.0.0.0:{}/metrics", port),
        None => println!("  Metrics: disabled"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}
