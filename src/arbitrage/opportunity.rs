//! Combination and opportunity types.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::math::{ceil_currency, roi_pct};
use crate::odds::{EventInfo, MarketContext, MarketType};

/// One chosen quote for one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Outcome label.
    #[serde(alias = "selection")]
    pub outcome: String,
    /// Source (bookmaker) offering the price.
    #[serde(alias = "bookmaker")]
    pub source: String,
    /// Decimal odds.
    #[serde(alias = "odds")]
    pub price: Decimal,
    /// `1 / price`.
    pub implied_probability: Decimal,
}

/// One quote per outcome of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combination {
    /// Chosen quotes, one per outcome.
    pub selections: Vec<Selection>,
    /// Sum of the selections' implied probabilities.
    pub total_implied_probability: Decimal,
    /// `1 - total_implied_probability`.
    pub profit_margin: Decimal,
}

impl Combination {
    /// Return on investment in percent.
    pub fn roi(&self) -> Decimal {
        roi_pct(self.profit_margin, self.total_implied_probability)
    }

    /// Whether every selection uses a different source.
    pub fn uses_distinct_sources(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.selections.len());
        self.selections.iter().all(|s| seen.insert(s.source.as_str()))
    }

    /// Selection for an outcome.
    pub fn selection(&self, outcome: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.outcome == outcome)
    }

    /// Smallest bankroll for which every stake is at least `min_stake`,
    /// never below `floor`.
    pub fn min_bankroll(&self, min_stake: Decimal, floor: Decimal) -> Decimal {
        let smallest = self
            .selections
            .iter()
            .map(|s| s.implied_probability)
            .filter(|p| *p > Decimal::ZERO)
            .min();

        let required = smallest
            .and_then(|p| (min_stake * self.total_implied_probability).checked_div(p))
            .map(ceil_currency)
            .unwrap_or(floor);

        required.max(floor)
    }
}

/// A qualifying combination enriched with market context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Opportunity identifier (`event-market-rank`).
    pub id: String,
    /// Event identifier.
    pub event_id: String,
    /// Market identifier.
    pub market_id: String,
    /// Market kind.
    #[serde(default)]
    pub market_type: MarketType,
    /// Event metadata, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventInfo>,
    /// Selections and probability figures.
    #[serde(flatten)]
    pub combination: Combination,
    /// Return on investment in percent.
    pub roi: Decimal,
    /// Smallest bankroll worth staking.
    pub min_bankroll: Decimal,
    /// When the opportunity was detected.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
    /// When the opportunity stops being actionable (event start).
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl Opportunity {
    /// Build an opportunity from a qualifying combination.
    ///
    /// `rank` is the 1-based position of the combination in its market's
    /// result list.
    pub fn new(
        context: &MarketContext,
        combination: Combination,
        rank: usize,
        min_stake: Decimal,
        min_bankroll_floor: Decimal,
        detected_at: OffsetDateTime,
    ) -> Self {
        let roi = combination.roi();
        let min_bankroll = combination.min_bankroll(min_stake, min_bankroll_floor);

        Self {
            id: format!("{}-{}-{}", context.event_id, context.market_id, rank),
            event_id: context.event_id.clone(),
            market_id: context.market_id.clone(),
            market_type: context.market_type,
            event: context.event.clone(),
            combination,
            roi,
            min_bankroll,
            detected_at,
            expires_at: context.expires_at(),
        }
    }

    /// Chosen quotes.
    pub fn selections(&self) -> &[Selection] {
        &self.combination.selections
    }

    /// Sum of implied probabilities.
    pub fn total_implied_probability(&self) -> Decimal {
        self.combination.total_implied_probability
    }

    /// Profit margin as a fraction.
    pub fn profit_margin(&self) -> Decimal {
        self.combination.profit_margin
    }

    /// Check if the opportunity has expired at `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}
