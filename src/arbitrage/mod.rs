//! Arbitrage detection and stake allocation.
//!
//! This module handles:
//! - Enumerating cross-bookmaker combinations whose implied probabilities sum below one
//! - Turning combinations into opportunities with market context
//! - Splitting a bankroll so every outcome pays the same
//! - Scanning many markets concurrently

pub mod generator;
pub mod math;
pub mod opportunity;
pub mod scanner;
pub mod stakes;

pub use generator::{
    find_combinations, find_opportunities, to_opportunities, EnumerationBudget, SearchParams,
    SourcePolicy,
};
pub use opportunity::{Combination, Opportunity, Selection};
pub use scanner::{scan_markets, ScanOptions, ScanReport};
pub use stakes::{
    allocate_combination_stakes, allocate_stakes, StakeEntry, StakePlan, StakeRounding,
};
