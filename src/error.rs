//! Unified error types for the arbitrage engine.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::arbitrage::Combination;

/// Unified error type for the engine and its command-line surface.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Arbitrage detection/allocation error.
    #[error("arbitrage error: {0}")]
    Arbitrage(#[from] ArbitrageError),

    /// Odds snapshot error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Arbitrage detection and stake allocation errors.
#[derive(Error, Debug)]
pub enum ArbitrageError {
    /// Input that cannot be filtered away without producing a wrong guarantee.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// Enumeration stopped before the whole search space was visited.
    ///
    /// `partial` holds the qualifying combinations found before the stop,
    /// already sorted by descending profit margin.
    #[error("compute budget exceeded after {evaluated} evaluations ({limit})")]
    ComputeBudgetExceeded {
        /// Candidate quotes examined before stopping.
        evaluated: u64,
        /// Which limit was hit.
        limit: BudgetLimit,
        /// Combinations found so far.
        partial: Vec<Combination>,
    },
}

impl ArbitrageError {
    /// Whether this is an input validation failure.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ArbitrageError::InvalidInput(_))
    }
}

/// Limit that stopped an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLimit {
    /// Maximum number of evaluated candidates.
    Evaluations(u64),
    /// Maximum wall-clock time.
    Duration(Duration),
}

impl std::fmt::Display for BudgetLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetLimit::Evaluations(max) => write!(f, "max {} evaluations", max),
            BudgetLimit::Duration(max) => write!(f, "max {}ms", max.as_millis()),
        }
    }
}

/// Input validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    /// Bankroll is zero or negative.
    #[error("total bankroll must be greater than 0, got {0}")]
    NonPositiveBankroll(Decimal),

    /// Decimal odds not strictly greater than 1.0.
    #[error("invalid price {price} for {outcome} at {bookmaker}")]
    InvalidPrice {
        /// Outcome label.
        outcome: String,
        /// Source (bookmaker) identifier.
        bookmaker: String,
        /// Offending price.
        price: Decimal,
    },

    /// A combination must cover at least two outcomes.
    #[error("at least 2 outcomes are required, got {0}")]
    NotEnoughOutcomes(usize),

    /// The same outcome appears twice in one combination.
    #[error("duplicate outcome {0}")]
    DuplicateOutcome(String),

    /// Total implied probability leaves no guaranteed profit.
    #[error("no arbitrage: total implied probability {0} >= 1")]
    NoArbitrage(Decimal),

    /// Supplied total disagrees with the selections' prices.
    #[error("inconsistent total implied probability: supplied {supplied}, computed {computed}")]
    InconsistentProbability {
        /// Total carried by the opportunity.
        supplied: Decimal,
        /// Total recomputed from prices.
        computed: Decimal,
    },

    /// Minimum profit margin below zero.
    #[error("minimum profit margin must not be negative, got {0}")]
    NegativeMarginThreshold(Decimal),

    /// Stake arithmetic left the representable decimal range.
    #[error("stake calculation overflowed for bankroll {0}")]
    StakeOverflow(Decimal),
}

/// Odds snapshot errors.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// An odds row references an event that is not in the snapshot.
    #[error("odds row references unknown event {0}")]
    UnknownEvent(String),

    /// Snapshot contains no usable markets.
    #[error("snapshot contains no usable markets")]
    Empty,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
