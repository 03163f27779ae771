use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Money is an exact decimal. Amounts are kept at the currency's minor unit
/// (two places) and rounded half-up, never through floating point.
pub type Money = Decimal;

/// Number of decimal places in the minor currency unit.
pub const MINOR_UNIT_PLACES: u32 = 2;

/// Round to the minor unit, half away from zero.
/// Example: 3.335 -> 3.34, -3.335 -> -3.34
pub fn round2(amount: Money) -> Money {
    amount.round_dp_with_strategy(MINOR_UNIT_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / whole * 100`, rounded to two places. A zero `whole` yields zero.
/// A ratio too large to represent saturates at `Decimal::MAX` or `Decimal::MIN`.
pub fn percentage(part: Money, whole: Money) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    let saturated = if part.is_sign_negative() == whole.is_sign_negative() {
        Decimal::MAX
    } else {
        Decimal::MIN
    };
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(round2)
        .unwrap_or(saturated)
}

/// Format an amount with exactly two decimals.
/// Example: 50 -> "50.00", -12.3 -> "-12.30"
pub fn format_amount(amount: Money) -> String {
    format!("{:.2}", round2(amount))
}

/// Parse a decimal string into an amount rounded to the minor unit.
/// Example: "50.00" -> 50.00, "12.5" -> 12.50, "100" -> 100.00
pub fn parse_amount(input: &str) -> Result<Money, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    let value: Decimal = input
        .parse()
        .map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))?;
    Ok(round2(value))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid money format: {0}")]
    InvalidFormat(String),
}
