//! Odds-related types: quotes, per-market odds books and market context.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::arbitrage::math::{implied_probability, is_valid_price};

/// Source recorded for quotes that arrive without a bookmaker identifier.
pub const DEFAULT_SOURCE: &str = "SYSTEM";

/// One bookmaker's decimal odds for an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Source (bookmaker) identifier.
    #[serde(alias = "bookmaker")]
    pub source: String,
    /// Decimal odds, strictly greater than 1.0.
    #[serde(alias = "odds", alias = "decimal")]
    pub price: Decimal,
}

impl Quote {
    /// Create a new quote.
    pub fn new(source: impl Into<String>, price: Decimal) -> Self {
        Self {
            source: source.into(),
            price,
        }
    }

    /// Implied probability (`1 / price`), `None` for unusable prices.
    pub fn implied_probability(&self) -> Option<Decimal> {
        implied_probability(self.price)
    }
}

/// Quote as it may arrive from a caller, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuote {
    /// Source identifier, possibly missing.
    #[serde(default, alias = "bookmaker")]
    pub source: Option<String>,
    /// Decimal odds, possibly missing.
    #[serde(default, alias = "odds", alias = "decimal")]
    pub price: Option<Decimal>,
}

/// Outcome label to quotes mapping for a single market.
///
/// Only quotes with a usable price are ever stored, so every outcome present
/// has at least one quote. Rejected quotes are counted, not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<RawQuote>>")]
pub struct OddsBook {
    #[serde(flatten)]
    outcomes: BTreeMap<String, Vec<Quote>>,
    #[serde(skip)]
    rejected: usize,
}

impl OddsBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from `(outcome, source, price)` triples.
    pub fn from_quotes<I, O, S>(quotes: I) -> Self
    where
        I: IntoIterator<Item = (O, S, Decimal)>,
        O: Into<String>,
        S: Into<String>,
    {
        let mut book = Self::new();
        for (outcome, source, price) in quotes {
            book.insert(outcome, source, Some(price));
        }
        book
    }

    /// Add a quote for an outcome.
    ///
    /// Missing or non-usable prices (≤ 1.0) are skipped and counted as
    /// rejected. A blank source is recorded as [`DEFAULT_SOURCE`].
    /// Returns whether the quote was stored.
    pub fn insert(
        &mut self,
        outcome: impl Into<String>,
        source: impl Into<String>,
        price: Option<Decimal>,
    ) -> bool {
        let price = match price {
            Some(p) if is_valid_price(p) => p,
            _ => {
                self.rejected += 1;
                return false;
            }
        };

        let source = source.into();
        let source = if source.trim().is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            source
        };

        self.outcomes
            .entry(outcome.into())
            .or_default()
            .push(Quote::new(source, price));
        true
    }

    /// Number of distinct outcomes with at least one usable quote.
    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Total number of stored quotes.
    pub fn quote_count(&self) -> usize {
        self.outcomes.values().map(Vec::len).sum()
    }

    /// Number of quotes skipped because of an unusable price.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Check if the book has no outcomes.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether the book covers enough outcomes to ever contain an arbitrage.
    pub fn can_arbitrage(&self) -> bool {
        self.outcomes.len() >= 2
    }

    /// Quotes for an outcome.
    pub fn quotes(&self, outcome: &str) -> Option<&[Quote]> {
        self.outcomes.get(outcome).map(Vec::as_slice)
    }

    /// Iterate over outcomes and their quotes, ordered by label.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Quote])> {
        self.outcomes
            .iter()
            .map(|(label, quotes)| (label.as_str(), quotes.as_slice()))
    }

    /// Number of complete combinations (product of per-outcome quote counts).
    ///
    /// Saturates at `u128::MAX`.
    pub fn search_space(&self) -> u128 {
        if self.outcomes.is_empty() {
            return 0;
        }
        self.outcomes
            .values()
            .fold(1u128, |acc, quotes| acc.saturating_mul(quotes.len() as u128))
    }

    /// Best available price for an outcome.
    pub fn best_price(&self, outcome: &str) -> Option<Decimal> {
        self.outcomes
            .get(outcome)?
            .iter()
            .map(|q| q.price)
            .max()
    }
}

impl From<BTreeMap<String, Vec<RawQuote>>> for OddsBook {
    fn from(raw: BTreeMap<String, Vec<RawQuote>>) -> Self {
        let mut book = Self::new();
        for (outcome, quotes) in raw {
            for quote in quotes {
                book.insert(
                    outcome.clone(),
                    quote.source.unwrap_or_default(),
                    quote.price,
                );
            }
        }
        book
    }
}

/// Kind of betting market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    /// Head-to-head winner market.
    #[default]
    MatchWinner,
    /// Point spread / handicap market.
    Handicap,
    /// Totals market.
    OverUnder,
    /// Anything else.
    Custom,
}

impl MarketType {
    /// Map an odds-feed market key (`h2h`, `spreads`, `totals`) or a canonical
    /// name (`MATCH_WINNER`, ...) to a market type.
    pub fn from_key(key: &str) -> Self {
        match key {
            "h2h" => MarketType::MatchWinner,
            "spreads" => MarketType::Handicap,
            "totals" => MarketType::OverUnder,
            other => other.parse().unwrap_or(MarketType::Custom),
        }
    }

    /// Human-readable market name.
    pub fn display_name(&self) -> &'static str {
        match self {
            MarketType::MatchWinner => "Match Winner",
            MarketType::Handicap => "Handicap",
            MarketType::OverUnder => "Over/Under",
            MarketType::Custom => "Custom",
        }
    }
}

/// Sporting event metadata supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// Event identifier.
    pub id: String,
    /// Home side.
    #[serde(default)]
    pub home_team: Option<String>,
    /// Away side.
    #[serde(default)]
    pub away_team: Option<String>,
    /// Sport slug (e.g. "soccer_epl").
    #[serde(default)]
    pub sport: Option<String>,
    /// Scheduled start time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
}

impl EventInfo {
    /// Create event metadata with only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            home_team: None,
            away_team: None,
            sport: None,
            starts_at: None,
        }
    }

    /// "Home vs Away" label when both sides are known.
    pub fn matchup(&self) -> Option<String> {
        match (&self.home_team, &self.away_team) {
            (Some(home), Some(away)) => Some(format!("{} vs {}", home, away)),
            _ => None,
        }
    }
}

/// Identity of the (event, market) an odds book belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    /// Event identifier.
    pub event_id: String,
    /// Market identifier.
    pub market_id: String,
    /// Market kind.
    #[serde(default)]
    pub market_type: MarketType,
    /// Event metadata, when known.
    #[serde(default)]
    pub event: Option<EventInfo>,
}

impl MarketContext {
    /// Create a context for a match-winner market.
    pub fn new(event_id: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            market_id: market_id.into(),
            market_type: MarketType::default(),
            event: None,
        }
    }

    /// Set the market type.
    pub fn with_market_type(mut self, market_type: MarketType) -> Self {
        self.market_type = market_type;
        self
    }

    /// Attach event metadata.
    pub fn with_event(mut self, event: EventInfo) -> Self {
        self.event = Some(event);
        self
    }

    /// When opportunities on this market stop being actionable.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.event.as_ref().and_then(|e| e.starts_at)
    }

    /// Stable "event/market" key used in logs and reports.
    pub fn key(&self) -> String {
        format!("{}/{}", self.event_id, self.market_id)
    }
}
