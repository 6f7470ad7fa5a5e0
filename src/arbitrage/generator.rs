//! Cross-bookmaker combination enumeration.
//!
//! The search is a depth-first walk over outcomes driven by an explicit
//! cursor stack (one frame per outcome), so memory stays bounded by the
//! number of outcomes and a budget can stop it at any point.
//!
//! Quotes are visited best price first. Implied probabilities are positive,
//! so once a partial sum overshoots the target every remaining quote at the
//! same depth overshoots as well and the whole branch is skipped.
//!
//! The search space is the product of per-outcome quote counts, i.e.
//! exponential in the number of outcomes. Markets with many outcomes and many
//! quotes per outcome are not intended usage; use
//! [`SearchParams::max_quotes_per_outcome`] and [`EnumerationBudget`] to bound it.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::math::{implied_probability, is_arbitrage, profit_margin};
use super::opportunity::{Combination, Opportunity, Selection};
use crate::error::{ArbitrageError, BudgetLimit, InvalidInput};
use crate::metrics;
use crate::odds::{MarketContext, OddsBook};

/// Outcomes handled without a heap allocation for the cursor stack.
const INLINE_OUTCOMES: usize = 4;

/// How often (in evaluations) the wall-clock budget is checked.
const CLOCK_CHECK_INTERVAL: u64 = 256;

/// Whether a combination may use the same source for several outcomes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourcePolicy {
    /// Any source may cover any number of outcomes.
    #[default]
    AllowSameSource,
    /// Every outcome must be covered by a different source.
    DistinctSources,
}

/// Limits on a single enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnumerationBudget {
    /// Maximum number of candidate quotes examined.
    pub max_evaluations: Option<u64>,
    /// Maximum wall-clock time.
    pub max_duration: Option<Duration>,
}

impl EnumerationBudget {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Which limit, if any, stops the search after `evaluated` candidates.
    fn exceeded(&self, evaluated: u64, started: Instant) -> Option<BudgetLimit> {
        if let Some(max) = self.max_evaluations {
            if evaluated >= max {
                return Some(BudgetLimit::Evaluations(max));
            }
        }
        if let Some(max) = self.max_duration {
            if evaluated % CLOCK_CHECK_INTERVAL == 0 && started.elapsed() >= max {
                return Some(BudgetLimit::Duration(max));
            }
        }
        None
    }
}

/// Parameters for finding opportunities in one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Minimum profit margin as a fraction (0.01 = 1%).
    pub min_profit_margin: Decimal,
    /// Same-source policy.
    pub source_policy: SourcePolicy,
    /// Keep only the best N prices per outcome.
    pub max_quotes_per_outcome: Option<usize>,
    /// Enumeration limits.
    pub budget: EnumerationBudget,
    /// Smallest usable stake for `min_bankroll`.
    pub min_stake: Decimal,
    /// Lower bound for `min_bankroll`.
    pub min_bankroll_floor: Decimal,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            min_profit_margin: dec!(0.01),
            source_policy: SourcePolicy::default(),
            max_quotes_per_outcome: None,
            budget: EnumerationBudget::unlimited(),
            min_stake: Decimal::ONE,
            min_bankroll_floor: dec!(10),
        }
    }
}

impl SearchParams {
    /// Default parameters with a specific minimum profit margin.
    pub fn with_min_profit_margin(min_profit_margin: Decimal) -> Self {
        Self {
            min_profit_margin,
            ..Self::default()
        }
    }
}

/// Candidate quote for one outcome.
struct Candidate<'a> {
    source: &'a str,
    price: Decimal,
    implied_probability: Decimal,
}

/// Candidates for one outcome, best price first.
struct Column<'a> {
    outcome: &'a str,
    candidates: Vec<Candidate<'a>>,
}

fn build_columns<'a>(book: &'a OddsBook, max_per_outcome: Option<usize>) -> Vec<Column<'a>> {
    book.iter()
        .map(|(outcome, quotes)| {
            let mut candidates: Vec<Candidate<'a>> = quotes
                .iter()
                .filter_map(|q| {
                    implied_probability(q.price).map(|p| Candidate {
                        source: q.source.as_str(),
                        price: q.price,
                        implied_probability: p,
                    })
                })
                .collect();
            candidates.sort_by(|a, b| a.implied_probability.cmp(&b.implied_probability));
            if let Some(max) = max_per_outcome {
                candidates.truncate(max);
            }
            Column {
                outcome,
                candidates,
            }
        })
        .filter(|column| !column.candidates.is_empty())
        .collect()
}

fn sort_by_margin(combinations: &mut [Combination]) {
    combinations.sort_by(|a, b| b.profit_margin.cmp(&a.profit_margin));
}

/// Enumerate every combination with `profit_margin >= min_profit_margin`.
///
/// Books with fewer than two usable outcomes yield an empty list. The result
/// is sorted by descending profit margin; the order of equal margins is not
/// specified.
pub fn find_combinations(
    book: &OddsBook,
    params: &SearchParams,
) -> Result<Vec<Combination>, ArbitrageError> {
    if params.min_profit_margin < Decimal::ZERO {
        return Err(InvalidInput::NegativeMarginThreshold(params.min_profit_margin).into());
    }

    let columns = build_columns(book, params.max_quotes_per_outcome);
    if columns.len() < 2 {
        return Ok(Vec::new());
    }

    // A combination qualifies while its total stays at or below the ceiling
    // and below the break-even tolerance.
    let ceiling = Decimal::ONE - params.min_profit_margin;
    let depth_count = columns.len();

    let mut cursor: SmallVec<[usize; INLINE_OUTCOMES]> = smallvec![0; depth_count];
    let mut partial: SmallVec<[Decimal; INLINE_OUTCOMES]> = smallvec![Decimal::ZERO; depth_count];
    let mut found = Vec::new();
    let mut evaluated: u64 = 0;
    let started = Instant::now();
    let mut depth = 0;

    loop {
        if cursor[depth] >= columns[depth].candidates.len() {
            if depth == 0 {
                break;
            }
            cursor[depth] = 0;
            depth -= 1;
            cursor[depth] += 1;
            continue;
        }

        if let Some(limit) = params.budget.exceeded(evaluated, started) {
            metrics::add_combinations_evaluated(evaluated);
            metrics::inc_budget_exceeded();
            sort_by_margin(&mut found);
            return Err(ArbitrageError::ComputeBudgetExceeded {
                evaluated,
                limit,
                partial: found,
            });
        }
        evaluated += 1;

        let candidate = &columns[depth].candidates[cursor[depth]];
        let total = partial[depth] + candidate.implied_probability;

        if total > ceiling || !is_arbitrage(total) {
            cursor[depth] = columns[depth].candidates.len();
            continue;
        }

        if params.source_policy == SourcePolicy::DistinctSources
            && (0..depth).any(|d| columns[d].candidates[cursor[d]].source == candidate.source)
        {
            cursor[depth] += 1;
            continue;
        }

        if depth + 1 == depth_count {
            found.push(combination_at(&columns, &cursor, total));
            cursor[depth] += 1;
        } else {
            partial[depth + 1] = total;
            depth += 1;
        }
    }

    metrics::add_combinations_evaluated(evaluated);
    sort_by_margin(&mut found);

    debug!(
        outcomes = depth_count,
        evaluated,
        found = found.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Enumeration complete"
    );

    Ok(found)
}

fn combination_at(columns: &[Column<'_>], cursor: &[usize], total: Decimal) -> Combination {
    let selections = columns
        .iter()
        .zip(cursor)
        .map(|(column, &index)| {
            let candidate = &column.candidates[index];
            Selection {
                outcome: column.outcome.to_string(),
                source: candidate.source.to_string(),
                price: candidate.price,
                implied_probability: candidate.implied_probability,
            }
        })
        .collect();

    Combination {
        selections,
        total_implied_probability: total,
        profit_margin: profit_margin(total),
    }
}

/// Turn ranked combinations into opportunities for a market.
pub fn to_opportunities(
    context: &MarketContext,
    combinations: Vec<Combination>,
    params: &SearchParams,
    detected_at: OffsetDateTime,
) -> Vec<Opportunity> {
    combinations
        .into_iter()
        .enumerate()
        .map(|(index, combination)| {
            Opportunity::new(
                context,
                combination,
                index + 1,
                params.min_stake,
                params.min_bankroll_floor,
                detected_at,
            )
        })
        .collect()
}

/// Find every arbitrage opportunity in one market's odds book.
#[instrument(skip(book, params), fields(market = %context.key(), min_margin = %params.min_profit_margin))]
pub fn find_opportunities(
    book: &OddsBook,
    context: &MarketContext,
    params: &SearchParams,
) -> Result<Vec<Opportunity>, ArbitrageError> {
    let _timer = metrics::timer_opportunity_detection();

    if !book.can_arbitrage() {
        debug!(outcomes = book.outcome_count(), "Not enough outcomes for arbitrage");
        return Ok(Vec::new());
    }

    debug!(
        outcomes = book.outcome_count(),
        quotes = book.quote_count(),
        search_space = %book.search_space(),
        "Searching combinations"
    );

    let combinations = find_combinations(book, params)?;
    let opportunities = to_opportunities(context, combinations, params, OffsetDateTime::now_utc());

    if let Some(best) = opportunities.first() {
        metrics::add_opportunities_detected(opportunities.len() as u64);
        info!(
            count = opportunities.len(),
            best_margin = %best.profit_margin(),
            best_roi = %best.roi,
            "Arbitrage opportunities detected"
        );
    }

    Ok(opportunities)
}
