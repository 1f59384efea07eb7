//! Periodic rate conversion and the annuity installment formula.

use rust_decimal::Decimal;

use crate::domain::{DomainError, PaymentFrequency};

/// Effective periodic rate for a nominal annual percentage.
///
/// `(1 + annual/100)^(1/periods_per_year) - 1`, compounding rather than a
/// linear split, so 12% a year is ~0.9489% a month. Non-positive rates
/// yield zero.
pub fn periodic_rate(
    annual_rate: Decimal,
    frequency: PaymentFrequency,
) -> Result<Decimal, DomainError> {
    if annual_rate <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let growth = Decimal::ONE + annual_rate / Decimal::ONE_HUNDRED;

    nth_root(growth, frequency.periods_per_year())
        .map(|factor| factor - Decimal::ONE)
        .ok_or(DomainError::InvalidRate(annual_rate))
}

/// Newton iteration for `value^(1/n)` with `value > 1`.
///
/// Starts from `1 + (value - 1)/n`, which lies above the root, so the
/// sequence decreases monotonically to it.
fn nth_root(value: Decimal, n: u32) -> Option<Decimal> {
    const MAX_ITERATIONS: usize = 64;

    if n == 1 {
        return Some(value);
    }

    let k = Decimal::from(n);
    let tolerance = Decimal::new(1, 24);
    let mut root = Decimal::ONE + (value - Decimal::ONE) / k;

    for _ in 0..MAX_ITERATIONS {
        let power = (1..n).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(root))?;
        let next = ((k - Decimal::ONE) * root + value.checked_div(power)?) / k;
        if (next - root).abs() <= tolerance {
            return Some(next);
        }
        root = next;
    }

    Some(root)
}

/// `(1 + rate)^periods`, or `None` when the factor degenerates to 1 or
/// overflows.
pub(crate) fn compound_factor(periodic_rate: Decimal, periods: i32) -> Option<Decimal> {
    if periodic_rate <= Decimal::ZERO || periods <= 0 {
        return None;
    }

    let base = Decimal::ONE + periodic_rate;
    let factor = (0..periods).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(base))?;

    (factor > Decimal::ONE).then_some(factor)
}

/// Fixed installment amortizing `principal` over `periods`, rounded up.
///
/// Uses the discrete annuity formula `P·r / (1 - (1+r)^-n)`, falling back to
/// `ceil(P / n)` for a zero rate or degenerate denominator. Returns zero when
/// there is nothing left to amortize.
pub fn fixed_installment(principal: Decimal, periodic_rate: Decimal, periods: i32) -> Decimal {
    if principal <= Decimal::ZERO || periods <= 0 {
        return Decimal::ZERO;
    }

    let linear = || (principal / Decimal::from(periods)).ceil();

    match compound_factor(periodic_rate, periods) {
        Some(factor) => Decimal::ONE
            .checked_div(factor)
            .map(|discount| Decimal::ONE - discount)
            .filter(|denominator| !denominator.is_zero())
            .and_then(|denominator| principal.checked_mul(periodic_rate)?.checked_div(denominator))
            .map(|v| v.ceil())
            .unwrap_or_else(linear),
        None => linear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_monthly_rate_is_compounded() {
        let rate = periodic_rate(dec!(12), PaymentFrequency::Monthly).unwrap();
        assert!((rate - dec!(0.009489)).abs() < dec!(0.000001), "got {rate}");
        assert!(rate < dec!(0.01));
    }

    #[test]
    fn test_annual_rate_is_unchanged() {
        let rate = periodic_rate(dec!(50), PaymentFrequency::Annually).unwrap();
        assert_eq!(rate, dec!(0.5));
    }

    #[test]
    fn test_compounded_rate_round_trips_to_annual() {
        let rate = periodic_rate(dec!(50), PaymentFrequency::Quarterly).unwrap();
        let annual = compound_factor(rate, 4).unwrap();
        assert!((annual - dec!(1.5)).abs() < dec!(0.0000001), "got {annual}");
    }

    #[test]
    fn test_nth_root() {
        let root = nth_root(dec!(16), 4).unwrap();
        assert!((root - dec!(2)).abs() < dec!(0.000000000001));
        assert_eq!(nth_root(dec!(1.5), 1), Some(dec!(1.5)));
    }

    #[test]
    fn test_zero_and_negative_rates() {
        assert_eq!(
            periodic_rate(dec!(0), PaymentFrequency::Weekly).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            periodic_rate(dec!(-5), PaymentFrequency::Weekly).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fixed_installment_annuity() {
        let rate = periodic_rate(dec!(12), PaymentFrequency::Monthly).unwrap();
        assert_eq!(fixed_installment(dec!(10000), rate, 12), dec!(886));
    }

    #[test]
    fn test_fixed_installment_zero_rate_rounds_up() {
        assert_eq!(fixed_installment(dec!(1200), Decimal::ZERO, 12), dec!(100));
        assert_eq!(fixed_installment(dec!(1000), Decimal::ZERO, 3), dec!(334));
    }

    #[test]
    fn test_fixed_installment_nothing_left() {
        let rate = dec!(0.01);
        assert_eq!(fixed_installment(dec!(0), rate, 12), Decimal::ZERO);
        assert_eq!(fixed_installment(dec!(500), rate, 0), Decimal::ZERO);
    }
}
