//! Flat odds rows and their grouping into per-market books.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{EventInfo, MarketContext, MarketType, OddsBook};
use crate::error::SnapshotError;
use crate::metrics;

fn default_active() -> bool {
    true
}

/// One price row as stored by an odds feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsRow {
    pub event_id: String,
    pub market_id: String,
    /// Feed market key or canonical name (`h2h`, `MATCH_WINNER`, ...).
    #[serde(default)]
    pub market_type: Option<String>,
    /// Outcome label.
    #[serde(alias = "outcome")]
    pub selection: String,
    /// Source offering the price; missing means the system itself.
    #[serde(default, alias = "bookmaker")]
    pub source: Option<String>,
    /// Decimal odds.
    #[serde(default, alias = "price", alias = "odds")]
    pub decimal: Option<Decimal>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Odds book of one market together with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub context: MarketContext,
    pub book: OddsBook,
}

/// Snapshot of events and odds rows handed in by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsSnapshot {
    #[serde(default)]
    pub events: Vec<EventInfo>,
    pub odds: Vec<OddsRow>,
}

impl OddsSnapshot {
    /// Group the rows into markets and attach event metadata.
    ///
    /// When the snapshot lists events, every row must reference one of them.
    /// Without an event list, rows are taken as they are.
    pub fn into_markets(self) -> Result<Vec<MarketSnapshot>, SnapshotError> {
        let events: HashMap<String, EventInfo> = self
            .events
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        if !events.is_empty() {
            if let Some(row) = self.odds.iter().find(|r| !events.contains_key(&r.event_id)) {
                return Err(SnapshotError::UnknownEvent(row.event_id.clone()));
            }
        }

        let markets: Vec<MarketSnapshot> = group_rows(self.odds)
            .into_iter()
            .map(|mut market| {
                if let Some(event) = events.get(&market.context.event_id) {
                    market.context.event = Some(event.clone());
                }
                market
            })
            .collect();

        if markets.is_empty() {
            return Err(SnapshotError::Empty);
        }
        Ok(markets)
    }
}

/// Group rows into one book per (event, market), ordered by event then market.
///
/// Inactive rows and rows without a usable price are dropped. Markets left
/// without any quote are omitted.
pub fn group_rows(rows: impl IntoIterator<Item = OddsRow>) -> Vec<MarketSnapshot> {
    let mut grouped: BTreeMap<(String, String), MarketSnapshot> = BTreeMap::new();
    let mut inactive = 0u64;

    for row in rows {
        if !row.is_active {
            inactive += 1;
            continue;
        }

        let market = grouped
            .entry((row.event_id.clone(), row.market_id.clone()))
            .or_insert_with(|| MarketSnapshot {
                context: MarketContext::new(row.event_id.clone(), row.market_id.clone())
                    .with_market_type(
                        row.market_type
                            .as_deref()
                            .map(MarketType::from_key)
                            .unwrap_or_default(),
                    ),
                book: OddsBook::new(),
            });

        market
            .book
            .insert(row.selection, row.source.unwrap_or_default(), row.decimal);
    }

    let rejected: usize = grouped.values().map(|m| m.book.rejected()).sum();
    if rejected > 0 {
        warn!(rejected, "Dropped odds rows without a usable price");
    }
    metrics::add_quotes_rejected(rejected as u64);
    debug!(inactive, markets = grouped.len(), "Grouped odds rows");

    grouped
        .into_values()
        .filter(|market| !market.book.is_empty())
        .collect()
}
