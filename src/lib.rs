//! Cross-bookmaker sports arbitrage detection and stake allocation.
//!
//! When the implied probabilities of the best available odds across all
//! outcomes of a market sum to less than one, a bettor can back every outcome
//! and lock in a profit whatever the result:
//!
//! ```text
//! Home @ 2.10 (bookmaker A):  1/2.10 = 0.4762
//! Away @ 2.20 (bookmaker B):  1/2.20 = 0.4545
//! ───────────────────────────────────────────
//! Total implied probability:           0.9307 < 1.0
//! Profit margin:                       6.93%
//! ```
//!
//! Staking 511.63 on Home and 488.37 on Away returns 1074.42 either way.
//!
//! # Modules
//!
//! - [`odds`]: Quotes, per-market odds books and feed rows
//! - [`arbitrage`]: Combination search, opportunities, stakes and scanning
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`metrics`]: Prometheus metrics

pub mod arbitrage;
pub mod config;
pub mod error;
pub mod metrics;
pub mod odds;

pub use config::Config;
pub use error::{AppError, Result};
