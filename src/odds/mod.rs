//! Odds input: quotes, per-market books and the flat row format they are
//! read from.

pub mod snapshot;
pub mod types;

pub use snapshot::{group_rows, MarketSnapshot, OddsRow, OddsSnapshot};
pub use types::{EventInfo, MarketContext, MarketType, OddsBook, Quote, RawQuote, DEFAULT_SOURCE};
