//! Decimal formatting helpers for exchange amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round half away from zero to a specific number of decimal places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Render an amount without the exchange's zero padding ("0.50000000" -> "0.5").
pub fn format_amount(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Render with exactly `decimals` places, e.g. PnL at 2.
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let mut rounded = round_to_precision(value, decimals);
    rounded.rescale(decimals);
    rounded.to_string()
}

/// Percentage with sign, e.g. "+3.25%".
pub fn format_percent(value: Decimal) -> String {
    let rounded = round_to_precision(value, 2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        "+"
    };
    format!("{}{}%", sign, format_fixed(rounded.abs(), 2))
}
