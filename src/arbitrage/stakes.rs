//! Proportional stake allocation for an arbitrage opportunity.
//!
//! `stake_i = bankroll * p_i / total` makes `stake_i * price_i` identical for
//! every outcome. All currency values are rounded to the cent.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, instrument};

use super::math::{floor_currency, implied_probability, is_arbitrage, profit_margin, round_currency};
use super::opportunity::{Combination, Opportunity};
use crate::error::{ArbitrageError, InvalidInput};
use crate::metrics;

/// Largest accepted gap between a supplied total implied probability and the
/// total recomputed from prices.
const PROBABILITY_TOLERANCE: Decimal = dec!(0.000001);

/// How per-selection rounding is reconciled with the bankroll.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StakeRounding {
    /// Round every stake independently; the total may drift by a few cents.
    /// Potential returns are computed from the unrounded stakes.
    #[default]
    PerSelection,
    /// Round every stake but the last, which takes the bankroll rounded down
    /// to the cent minus the others, so the total never exceeds the bankroll.
    /// Potential returns are computed from the placed stakes.
    AbsorbRemainder,
}

/// Stake to place on one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeEntry {
    /// Outcome label.
    #[serde(alias = "selection")]
    pub outcome: String,
    /// Source (bookmaker) to place the stake with.
    #[serde(alias = "bookmaker")]
    pub source: String,
    /// Decimal odds.
    #[serde(alias = "odds")]
    pub price: Decimal,
    /// Stake, rounded to the cent.
    pub stake: Decimal,
    /// Payout if this outcome wins, rounded to the cent.
    pub potential_return: Decimal,
}

/// Stakes for every selection of an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakePlan {
    /// One entry per selection, in selection order.
    pub stakes: Vec<StakeEntry>,
    /// Sum of stakes, rounded to the cent.
    pub total_stake: Decimal,
    /// `total_stake * (1 - total implied probability)`, rounded to the cent.
    pub guaranteed_profit: Decimal,
    /// Return on investment of the opportunity, in percent.
    pub roi: Decimal,
    /// Profit margin in percent.
    pub profit_margin_pct: Decimal,
}

impl StakePlan {
    /// Smallest payout across outcomes.
    pub fn worst_case_return(&self) -> Decimal {
        self.stakes
            .iter()
            .map(|s| s.potential_return)
            .min()
            .unwrap_or(Decimal::ZERO)
    }

    /// Largest difference between any two payouts.
    pub fn payout_spread(&self) -> Decimal {
        let max = self.stakes.iter().map(|s| s.potential_return).max();
        match max {
            Some(max) => max - self.worst_case_return(),
            None => Decimal::ZERO,
        }
    }
}

/// Allocate a bankroll across an opportunity's selections.
///
/// The opportunity's `roi` is carried into the plan unchanged.
#[instrument(skip(opportunity), fields(opportunity = %opportunity.id))]
pub fn allocate_stakes(
    opportunity: &Opportunity,
    total_bankroll: Decimal,
    rounding: StakeRounding,
) -> Result<StakePlan, ArbitrageError> {
    allocate(&opportunity.combination, opportunity.roi, total_bankroll, rounding)
}

/// Allocate a bankroll across a bare combination.
pub fn allocate_combination_stakes(
    combination: &Combination,
    total_bankroll: Decimal,
    rounding: StakeRounding,
) -> Result<StakePlan, ArbitrageError> {
    allocate(combination, combination.roi(), total_bankroll, rounding)
}

/// Implied probabilities recomputed from prices, with the selection shape checked.
fn validated_probabilities(combination: &Combination) -> Result<Vec<Decimal>, InvalidInput> {
    let selections = &combination.selections;
    if selections.len() < 2 {
        return Err(InvalidInput::NotEnoughOutcomes(selections.len()));
    }

    let mut seen = HashSet::with_capacity(selections.len());
    let mut probabilities = Vec::with_capacity(selections.len());
    for selection in selections {
        if !seen.insert(selection.outcome.as_str()) {
            return Err(InvalidInput::DuplicateOutcome(selection.outcome.clone()));
        }
        let probability =
            implied_probability(selection.price).ok_or_else(|| InvalidInput::InvalidPrice {
                outcome: selection.outcome.clone(),
                bookmaker: selection.source.clone(),
                price: selection.price,
            })?;
        probabilities.push(probability);
    }

    let computed: Decimal = probabilities.iter().sum();
    let supplied = combination.total_implied_probability;
    if (supplied - computed).abs() > PROBABILITY_TOLERANCE {
        return Err(InvalidInput::InconsistentProbability { supplied, computed });
    }
    if !is_arbitrage(computed) {
        return Err(InvalidInput::NoArbitrage(computed));
    }

    Ok(probabilities)
}

fn allocate(
    combination: &Combination,
    roi: Decimal,
    total_bankroll: Decimal,
    rounding: StakeRounding,
) -> Result<StakePlan, ArbitrageError> {
    if total_bankroll <= Decimal::ZERO {
        return Err(InvalidInput::NonPositiveBankroll(total_bankroll).into());
    }

    let probabilities = validated_probabilities(combination)?;
    let total: Decimal = probabilities.iter().sum();
    let overflow = || InvalidInput::StakeOverflow(total_bankroll);

    let mut raw_stakes = Vec::with_capacity(probabilities.len());
    for probability in &probabilities {
        let stake = total_bankroll
            .checked_mul(*probability)
            .and_then(|v| v.checked_div(total))
            .ok_or_else(overflow)?;
        raw_stakes.push(stake);
    }

    let mut placed: Vec<Decimal> = raw_stakes.iter().copied().map(round_currency).collect();
    if rounding == StakeRounding::AbsorbRemainder {
        let last = placed.len() - 1;
        let others: Decimal = placed[..last].iter().sum();
        placed[last] = floor_currency(total_bankroll) - others;
    }

    let mut stakes = Vec::with_capacity(placed.len());
    for ((selection, raw), stake) in combination.selections.iter().zip(&raw_stakes).zip(&placed) {
        let basis = match rounding {
            StakeRounding::PerSelection => *raw,
            StakeRounding::AbsorbRemainder => *stake,
        };
        let potential_return = basis.checked_mul(selection.price).ok_or_else(overflow)?;
        stakes.push(StakeEntry {
            outcome: selection.outcome.clone(),
            source: selection.source.clone(),
            price: selection.price,
            stake: *stake,
            potential_return: round_currency(potential_return),
        });
    }

    let total_stake = round_currency(placed.iter().sum());
    let margin = profit_margin(total);
    let guaranteed_profit = round_currency(total_stake * margin);

    metrics::inc_stake_plans();
    debug!(
        bankroll = %total_bankroll,
        total_stake = %total_stake,
        guaranteed_profit = %guaranteed_profit,
        rounding = %rounding,
        "Stake plan computed"
    );

    Ok(StakePlan {
        stakes,
        total_stake,
        guaranteed_profit,
        roi,
        profit_margin_pct: margin * Decimal::ONE_HUNDRED,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::generator::{find_opportunities, SearchParams};
    use crate::arbitrage::opportunity::Selection;
    use crate::odds::{MarketContext, OddsBook};
    use pretty_assertions::assert_eq;

    fn two_way_opportunity() -> Opportunity {
        let book = OddsBook::from_quotes([("Home", "A", dec!(2.10)), ("Away", "B", dec!(2.20))]);
        let context = MarketContext::new("evt-1", "mkt-1");
        find_opportunities(&book, &context, &SearchParams::default())
            .unwrap()
            .remove(0)
    }

    fn three_way_opportunity() -> Opportunity {
        let book = OddsBook::from_quotes([
            ("Home", "A", dec!(3.40)),
            ("Draw", "B", dec!(3.90)),
            ("Away", "C", dec!(3.30)),
        ]);
        let context = MarketContext::new("evt-2", "mkt-2");
        find_opportunities(&book, &context, &SearchParams::default())
            .unwrap()
            .remove(0)
    }

    fn entry<'a>(plan: &'a StakePlan, outcome: &str) -> &'a StakeEntry {
        plan.stakes.iter().find(|s| s.outcome == outcome).unwrap()
    }

    #[test]
    fn two_way_split_on_thousand() {
        let opp = two_way_opportunity();

        let plan = allocate_stakes(&opp, dec!(1000), StakeRounding::PerSelection).unwrap();

        // 1000 * 2.2 / 4.3 = 511.627..., 1000 * 2.1 / 4.3 = 488.372...
        assert_eq!(entry(&plan, "Home").stake, dec!(511.63));
        assert_eq!(entry(&plan, "Away").stake, dec!(488.37));
        assert_eq!(entry(&plan, "Home").potential_return, dec!(1074.42));
        assert_eq!(entry(&plan, "Away").potential_return, dec!(1074.42));
        assert_eq!(plan.total_stake, dec!(1000.00));
        // 1000 * (1 - 0.930735...) = 69.264...
        assert_eq!(plan.guaranteed_profit, dec!(69.26));
        assert_eq!(plan.roi, opp.roi);
        assert_eq!(entry(&plan, "Home").source, "A");
    }

    #[test]
    fn zero_bankroll_is_rejected() {
        let opp = two_way_opportunity();

        let result = allocate_stakes(&opp, Decimal::ZERO, StakeRounding::PerSelection);

        assert!(matches!(
            result,
            Err(ArbitrageError::InvalidInput(InvalidInput::NonPositiveBankroll(_)))
        ));
        assert!(allocate_stakes(&opp, dec!(-50), StakeRounding::PerSelection)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn payouts_equal_within_rounding() {
        let opp = three_way_opportunity();

        for bankroll in [dec!(10), dec!(137.45), dec!(1000), dec!(25000)] {
            let plan = allocate_stakes(&opp, bankroll, StakeRounding::PerSelection).unwrap();
            assert!(plan.payout_spread() <= dec!(0.02), "spread {}", plan.payout_spread());
            let staked: Decimal = plan.stakes.iter().map(|s| s.stake).sum();
            assert!((staked - bankroll).abs() <= dec!(0.03));
        }
    }

    #[test]
    fn scaling_bankroll_scales_stakes() {
        let opp = three_way_opportunity();

        let small = allocate_stakes(&opp, dec!(500), StakeRounding::PerSelection).unwrap();
        let large = allocate_stakes(&opp, dec!(1500), StakeRounding::PerSelection).unwrap();

        for (s, l) in small.stakes.iter().zip(&large.stakes) {
            assert!((s.stake * dec!(3) - l.stake).abs() <= dec!(0.02));
        }
        assert!((small.guaranteed_profit * dec!(3) - large.guaranteed_profit).abs() <= dec!(0.05));
        assert_eq!(small.roi, large.roi);
    }

    #[test]
    fn absorb_remainder_conserves_bankroll_exactly() {
        let opp = three_way_opportunity();

        let plan = allocate_stakes(&opp, dec!(100), StakeRounding::AbsorbRemainder).unwrap();

        let staked: Decimal = plan.stakes.iter().map(|s| s.stake).sum();
        assert_eq!(staked, dec!(100));
        assert_eq!(plan.total_stake, dec!(100));
        assert!(plan.payout_spread() <= dec!(0.05));
    }

    #[test]
    fn rejects_combination_without_arbitrage() {
        let combo = Combination {
            selections: vec![
                Selection {
                    outcome: "Home".to_string(),
                    source: "A".to_string(),
                    price: dec!(1.8),
                    implied_probability: Decimal::ONE / dec!(1.8),
                },
                Selection {
                    outcome: "Away".to_string(),
                    source: "A".to_string(),
                    price: dec!(2.0),
                    implied_probability: dec!(0.5),
                },
            ],
            total_implied_probability: Decimal::ONE / dec!(1.8) + dec!(0.5),
            profit_margin: Decimal::ONE - (Decimal::ONE / dec!(1.8) + dec!(0.5)),
        };

        let result = allocate_combination_stakes(&combo, dec!(100), StakeRounding::PerSelection);

        assert!(matches!(
            result,
            Err(ArbitrageError::InvalidInput(InvalidInput::NoArbitrage(_)))
        ));
    }

    #[test]
    fn rejects_truncated_break_even_combination() {
        let third = Decimal::ONE / dec!(3);
        let selection = |outcome: &str| Selection {
            outcome: outcome.to_string(),
            source: "A".to_string(),
            price: dec!(3),
            implied_probability: third,
        };
        let total = third + third + third;
        let combo = Combination {
            selections: vec![selection("Home"), selection("Draw"), selection("Away")],
            total_implied_probability: total,
            profit_margin: Decimal::ONE - total,
        };

        let result = allocate_combination_stakes(&combo, dec!(1000), StakeRounding::PerSelection);

        assert!(matches!(
            result,
            Err(ArbitrageError::InvalidInput(InvalidInput::NoArbitrage(_)))
        ));
    }

    #[test]
    fn absorb_remainder_never_exceeds_bankroll() {
        let opp = three_way_opportunity();

        let plan = allocate_stakes(&opp, dec!(100.005), StakeRounding::AbsorbRemainder).unwrap();

        let staked: Decimal = plan.stakes.iter().map(|s| s.stake).sum();
        assert_eq!(staked, dec!(100.00));
        assert!(plan.total_stake <= dec!(100.005));
    }

    #[test]
    fn invalid_price_names_the_bookmaker() {
        let mut opp = two_way_opportunity();
        opp.combination.selections[0].price = dec!(0.95);

        let err = allocate_stakes(&opp, dec!(100), StakeRounding::PerSelection).unwrap_err();

        assert!(err.to_string().contains("0.95"));
        let bookmaker = &opp.combination.selections[0].source;
        assert!(err.to_string().contains(&format!("at {}", bookmaker)));
    }

    #[test]
    fn rejects_single_selection_and_bad_prices() {
        let mut opp = two_way_opportunity();
        let mut single = opp.clone();
        single.combination.selections.truncate(1);

        assert!(matches!(
            allocate_stakes(&single, dec!(100), StakeRounding::PerSelection),
            Err(ArbitrageError::InvalidInput(InvalidInput::NotEnoughOutcomes(1)))
        ));

        opp.combination.selections[0].price = dec!(0.95);
        assert!(matches!(
            allocate_stakes(&opp, dec!(100), StakeRounding::PerSelection),
            Err(ArbitrageError::InvalidInput(InvalidInput::InvalidPrice { .. }))
        ));
    }

    #[test]
    fn rejects_inconsistent_total_and_duplicate_outcomes() {
        let mut opp = two_way_opportunity();
        opp.combination.total_implied_probability = dec!(0.5);

        assert!(matches!(
            allocate_stakes(&opp, dec!(100), StakeRounding::PerSelection),
            Err(ArbitrageError::InvalidInput(InvalidInput::InconsistentProbability { .. }))
        ));

        let mut dup = two_way_opportunity();
        let first = dup.combination.selections[0].clone();
        dup.combination.selections[1] = first;
        assert!(matches!(
            allocate_stakes(&dup, dec!(100), StakeRounding::PerSelection),
            Err(ArbitrageError::InvalidInput(InvalidInput::DuplicateOutcome(_)))
        ));
    }

    #[test]
    fn huge_bankroll_overflows_cleanly() {
        let opp = two_way_opportunity();

        let result = allocate_stakes(&opp, Decimal::MAX, StakeRounding::PerSelection);

        assert!(matches!(
            result,
            Err(ArbitrageError::InvalidInput(InvalidInput::StakeOverflow(_)))
        ));
    }

    #[test]
    fn plan_json_uses_camel_case_names() {
        let plan = allocate_stakes(&two_way_opportunity(), dec!(1000), StakeRounding::PerSelection)
            .unwrap();

        let json = serde_json::to_value(&plan).unwrap();

        assert!(json.get("stakes").is_some());
        assert!(json.get("totalStake").is_some());
        assert!(json.get("guaranteedProfit").is_some());
        assert!(json["stakes"][0].get("potentialReturn").is_some());
    }

    #[test]
    fn stake_rounding_parses_from_config_strings() {
        use std::str::FromStr;
        assert_eq!(
            StakeRounding::from_str("absorb_remainder").unwrap(),
            StakeRounding::AbsorbRemainder
        );
        assert_eq!(StakeRounding::PerSelection.to_string(), "per_selection");
    }
}
