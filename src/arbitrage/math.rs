//! Shared numeric helpers: implied probability, margins and currency rounding.
//!
//! Currency values are rounded to the nearest cent with ties away from zero
//! (`1.005 -> 1.01`, `-1.005 -> -1.01`).

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Decimal places used for currency amounts.
pub const CURRENCY_DP: u32 = 2;

/// Totals this close to one are break-even (`1/3` truncates at 28 digits).
pub const BREAK_EVEN_TOLERANCE: Decimal = dec!(0.00000000000000000001);

/// Check whether decimal odds are usable (strictly greater than 1.0).
pub fn is_valid_price(price: Decimal) -> bool {
    price > Decimal::ONE
}

/// Implied probability of decimal odds (`1 / price`).
///
/// Returns `None` for odds that are not strictly greater than 1.0.
pub fn implied_probability(price: Decimal) -> Option<Decimal> {
    if !is_valid_price(price) {
        return None;
    }
    Decimal::ONE.checked_div(price)
}

/// Convert floating-point odds, mapping NaN and infinities to `None`.
pub fn price_from_f64(price: f64) -> Option<Decimal> {
    if !price.is_finite() {
        return None;
    }
    Decimal::from_f64(price)
}

/// Whether a total implied probability leaves a profit.
pub fn is_arbitrage(total_implied_probability: Decimal) -> bool {
    total_implied_probability < Decimal::ONE - BREAK_EVEN_TOLERANCE
}

/// Profit margin of a combination (`1 - total implied probability`).
pub fn profit_margin(total_implied_probability: Decimal) -> Decimal {
    Decimal::ONE - total_implied_probability
}

/// Return on investment in percent (`margin / total * 100`).
pub fn roi_pct(profit_margin: Decimal, total_implied_probability: Decimal) -> Decimal {
    if total_implied_probability <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (profit_margin / total_implied_probability) * Decimal::ONE_HUNDRED
}

/// Round a currency amount to the nearest cent.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a currency amount down (toward zero) to the cent.
pub fn floor_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::ToZero)
}

/// Round a currency amount up to the next cent.
pub fn ceil_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::ToPositiveInfinity)
}
