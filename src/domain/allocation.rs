use rust_decimal::Decimal;

use super::{round2, Money};

/// Split `total` into parts proportional to `weights`.
///
/// Every part is rounded half-up to the minor unit independently, then the
/// rounding residual is added to the first part so that the parts always sum
/// to `total` exactly. The first element therefore absorbs the rounding error.
///
/// Zero-sum weights produce all-zero parts. Negative weights count as zero.
pub fn split(total: Money, weights: &[Decimal]) -> Vec<Money> {
    let total = round2(total);

    match weights.len() {
        0 => return Vec::new(),
        1 => return vec![total],
        _ => {}
    }

    // scale by the largest weight so the sum cannot overflow
    let largest = weights.iter().copied().fold(Decimal::ZERO, Decimal::max);
    if largest.is_zero() {
        return vec![Decimal::ZERO; weights.len()];
    }
    let weights: Vec<Decimal> = weights
        .iter()
        .map(|w| (*w).max(Decimal::ZERO).checked_div(largest).unwrap_or(Decimal::ZERO))
        .collect();
    let weight_sum: Decimal = weights.iter().sum();

    let mut amounts: Vec<Money> = weights
        .iter()
        .map(|w| {
            w.checked_div(weight_sum)
                .and_then(|ratio| total.checked_mul(ratio))
                .map(round2)
                .unwrap_or(Decimal::ZERO)
        })
        .collect();

    let allocated = amounts
        .iter()
        .skip(1)
        .fold(Decimal::ZERO, |sum, amount| sum.saturating_add(*amount));
    amounts[0] = total.saturating_sub(allocated);
    amounts
}

/// Split `total` into `parts` equal shares (residual on the first share).
pub fn split_evenly(total: Money, parts: usize) -> Vec<Money> {
    split(total, &vec![Decimal::ONE; parts])
}
