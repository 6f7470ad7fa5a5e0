//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::arbitrage::{EnumerationBudget, ScanOptions, SearchParams, SourcePolicy, StakeRounding};

/// Log filter used for verbose output.
pub const VERBOSE_LOG_FILTER: &str = "odds_arb=debug,info";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Detection Parameters ===
    /// Minimum profit margin as a fraction (0.01 = 1%).
    #[serde(default = "default_min_profit_margin")]
    pub min_profit_margin: Decimal,

    /// Require a different bookmaker for every outcome.
    #[serde(default)]
    pub distinct_sources: bool,

    /// Keep only the best N prices per outcome (unset = all).
    #[serde(default)]
    pub max_quotes_per_outcome: Option<usize>,

    // === Enumeration Budget ===
    /// Maximum candidate quotes examined per market (0 = unlimited).
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,

    /// Maximum wall-clock time per market in milliseconds (0 = unlimited).
    #[serde(default = "default_max_enumeration_ms")]
    pub max_enumeration_ms: u64,

    // === Stakes ===
    /// Smallest stake worth placing on one selection.
    #[serde(default = "default_min_stake")]
    pub min_stake: Decimal,

    /// Lower bound for an opportunity's minimum bankroll.
    #[serde(default = "default_min_bankroll_floor")]
    pub min_bankroll_floor: Decimal,

    /// Rounding mode for stake plans (per_selection or absorb_remainder).
    #[serde(default)]
    pub stake_rounding: StakeRounding,

    // === Scanning ===
    /// Keep only the best opportunity per event.
    #[serde(default = "default_true")]
    pub best_per_event: bool,

    /// Maximum number of opportunities reported.
    #[serde(default = "default_opportunities_limit")]
    pub opportunities_limit: usize,

    /// Markets searched concurrently.
    #[serde(default = "default_scan_workers")]
    pub scan_workers: usize,

    // === Observability ===
    /// Port for the Prometheus scrape endpoint (unset = no exporter).
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_min_profit_margin() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_max_evaluations() -> u64 {
    1_000_000
}

fn default_max_enumeration_ms() -> u64 {
    2_000
}

fn default_min_stake() -> Decimal {
    Decimal::new(100, 2) // 1.00
}

fn default_min_bankroll_floor() -> Decimal {
    Decimal::new(10, 0)
}

fn default_true() -> bool {
    true
}

fn default_opportunities_limit() -> usize {
    50
}

fn default_scan_workers() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_profit_margin: default_min_profit_margin(),
            distinct_sources: false,
            max_quotes_per_outcome: None,
            max_evaluations: default_max_evaluations(),
            max_enumeration_ms: default_max_enumeration_ms(),
            min_stake: default_min_stake(),
            min_bankroll_floor: default_min_bankroll_floor(),
            stake_rounding: StakeRounding::default(),
            best_per_event: true,
            opportunities_limit: default_opportunities_limit(),
            scan_workers: default_scan_workers(),
            metrics_port: None,
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_profit_margin < Decimal::ZERO || self.min_profit_margin >= Decimal::ONE {
            return Err("MIN_PROFIT_MARGIN must be in [0, 1)".to_string());
        }

        if self.max_quotes_per_outcome == Some(0) {
            return Err("MAX_QUOTES_PER_OUTCOME must be at least 1".to_string());
        }

        if self.min_stake <= Decimal::ZERO {
            return Err("MIN_STAKE must be positive".to_string());
        }

        if self.min_bankroll_floor < Decimal::ZERO {
            return Err("MIN_BANKROLL_FLOOR must not be negative".to_string());
        }

        if self.opportunities_limit == 0 {
            return Err("OPPORTUNITIES_LIMIT must be at least 1".to_string());
        }

        if self.scan_workers == 0 {
            return Err("SCAN_WORKERS must be at least 1".to_string());
        }

        Ok(())
    }

    /// Log filter directive; `--verbose` or `VERBOSE` switch to debug output.
    pub fn log_filter(&self, verbose_flag: bool) -> &str {
        if verbose_flag || self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            &self.rust_log
        }
    }

    /// Same-source policy implied by `distinct_sources`.
    pub fn source_policy(&self) -> SourcePolicy {
        if self.distinct_sources {
            SourcePolicy::DistinctSources
        } else {
            SourcePolicy::AllowSameSource
        }
    }

    /// Enumeration budget; zero disables a limit.
    pub fn budget(&self) -> EnumerationBudget {
        EnumerationBudget {
            max_evaluations: (self.max_evaluations > 0).then_some(self.max_evaluations),
            max_duration: (self.max_enumeration_ms > 0)
                .then(|| Duration::from_millis(self.max_enumeration_ms)),
        }
    }

    /// Per-market search parameters.
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            min_profit_margin: self.min_profit_margin,
            source_policy: self.source_policy(),
            max_quotes_per_outcome: self.max_quotes_per_outcome,
            budget: self.budget(),
            min_stake: self.min_stake,
            min_bankroll_floor: self.min_bankroll_floor,
        }
    }

    /// Scan merge options.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            best_per_event: self.best_per_event,
            limit: self.opportunities_limit,
            workers: self.scan_workers,
        }
    }
}
