//! Constant-installment (French) amortization table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, PaymentFrequency};

use super::rate::{compound_factor, fixed_installment, periodic_rate};

/// One row of the amortization table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub installment_number: i32,
    pub capital_at_period_start: Decimal,
    pub interest_for_period: Decimal,
    pub amortization: Decimal,
    pub calculated_installment_amount: Decimal,
    pub capital_at_period_end: Decimal,
}

/// Amortization table for a principal/rate/term/frequency tuple.
///
/// All money is rounded up to whole currency units, and the final entry
/// always retires whatever capital is left, so the amortization column sums
/// to the principal exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub principal: Decimal,
    pub periodic_rate: Decimal,
    pub entries: Vec<ScheduleEntry>,
}

impl AmortizationSchedule {
    /// Build the table for installments `1..=number_of_installments`.
    ///
    /// Returns an empty table when `principal <= 0`,
    /// `number_of_installments <= 0` or `annual_rate < 0`. A positive rate
    /// whose compounding overflows over the term is `InvalidRate`.
    pub fn generate(
        principal: Decimal,
        annual_rate: Decimal,
        number_of_installments: i32,
        frequency: PaymentFrequency,
    ) -> Result<Self, DomainError> {
        if principal <= Decimal::ZERO
            || number_of_installments <= 0
            || annual_rate < Decimal::ZERO
        {
            return Ok(Self::empty(principal));
        }

        let rate = periodic_rate(annual_rate, frequency)?;

        let entries = if rate.is_zero() {
            linear_entries(principal, number_of_installments)
        } else {
            compound_factor(rate, number_of_installments)
                .and_then(|_| annuity_entries(principal, rate, number_of_installments))
                .ok_or(DomainError::InvalidRate(annual_rate))?
        };

        Ok(Self {
            principal,
            periodic_rate: rate,
            entries,
        })
    }

    pub fn empty(principal: Decimal) -> Self {
        Self {
            principal,
            periodic_rate: Decimal::ZERO,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a 1-based installment number
    pub fn entry(&self, installment_number: i32) -> Option<&ScheduleEntry> {
        usize::try_from(installment_number - 1)
            .ok()
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn total_amortization(&self) -> Decimal {
        self.entries.iter().map(|e| e.amortization).sum()
    }
}

/// Interest-free table: equal rounded-up shares, the last one absorbing the
/// remainder.
fn linear_entries(principal: Decimal, periods: i32) -> Vec<ScheduleEntry> {
    let installment = fixed_installment(principal, Decimal::ZERO, periods);
    let mut capital = principal;

    (1..=periods)
        .map(|number| {
            let amortization = if number == periods {
                capital
            } else {
                installment.min(capital)
            };
            let entry = ScheduleEntry {
                installment_number: number,
                capital_at_period_start: capital,
                interest_for_period: Decimal::ZERO,
                amortization,
                calculated_installment_amount: amortization,
                capital_at_period_end: capital - amortization,
            };
            capital -= amortization;
            entry
        })
        .collect()
}

/// Constant-installment table; `None` if any period's interest overflows.
fn annuity_entries(principal: Decimal, rate: Decimal, periods: i32) -> Option<Vec<ScheduleEntry>> {
    let fixed = fixed_installment(principal, rate, periods);
    let mut capital = principal;

    (1..=periods)
        .map(|number| {
            let interest = capital.checked_mul(rate)?.ceil();
            let (amortization, installment) = if number == periods {
                (capital, capital.checked_add(interest)?.ceil())
            } else {
                let amortization = (fixed - interest).max(Decimal::ZERO).min(capital);
                (amortization, fixed)
            };
            let entry = ScheduleEntry {
                installment_number: number,
                capital_at_period_start: capital,
                interest_for_period: interest,
                amortization,
                calculated_installment_amount: installment,
                capital_at_period_end: capital - amortization,
            };
            capital -= amortization;
            Some(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_rate_schedule() {
        let schedule =
            AmortizationSchedule::generate(dec!(1200), dec!(0), 12, PaymentFrequency::Monthly)
                .unwrap();

        assert_eq!(schedule.entries.len(), 12);
        for entry in &schedule.entries {
            assert_eq!(entry.amortization, dec!(100));
            assert_eq!(entry.interest_for_period, Decimal::ZERO);
            assert_eq!(entry.calculated_installment_amount, dec!(100));
        }
        assert_eq!(schedule.entries[11].capital_at_period_end, Decimal::ZERO);
    }

    #[test]
    fn test_zero_rate_last_installment_absorbs_remainder() {
        let schedule =
            AmortizationSchedule::generate(dec!(1000), dec!(0), 3, PaymentFrequency::Monthly)
                .unwrap();
        let amortizations: Vec<_> = schedule.entries.iter().map(|e| e.amortization).collect();
        assert_eq!(amortizations, vec![dec!(334), dec!(334), dec!(332)]);

        // ceil(5 / 4) = 2 would overshoot; later shares are capped at what is left
        let schedule =
            AmortizationSchedule::generate(dec!(5), dec!(0), 4, PaymentFrequency::Monthly)
                .unwrap();
        let amortizations: Vec<_> = schedule.entries.iter().map(|e| e.amortization).collect();
        assert_eq!(amortizations, vec![dec!(2), dec!(2), dec!(1), dec!(0)]);
    }

    #[test]
    fn test_schedule_sums_to_principal() {
        let cases = [
            (dec!(10000), dec!(50), 12, PaymentFrequency::Monthly),
            (dec!(12345.67), dec!(24), 36, PaymentFrequency::Weekly),
            (dec!(999), dec!(12), 1, PaymentFrequency::Annually),
            (dec!(100000), dec!(120), 52, PaymentFrequency::Biweekly),
            (dec!(7500.5), dec!(18), 8, PaymentFrequency::Quarterly),
            (dec!(5), dec!(0), 4, PaymentFrequency::Monthly),
        ];

        for (principal, rate, n, frequency) in cases {
            let schedule = AmortizationSchedule::generate(principal, rate, n, frequency).unwrap();
            assert_eq!(schedule.entries.len(), n as usize);
            assert_eq!(
                schedule.total_amortization(),
                principal,
                "principal {principal} rate {rate} n {n} {frequency}"
            );
            let last = schedule.entries.last().unwrap();
            assert_eq!(last.capital_at_period_end, Decimal::ZERO);
            for entry in &schedule.entries {
                assert!(entry.amortization >= Decimal::ZERO);
                assert!(entry.capital_at_period_end >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_annuity_first_period() {
        let schedule =
            AmortizationSchedule::generate(dec!(10000), dec!(12), 12, PaymentFrequency::Monthly)
                .unwrap();
        let first = schedule.entry(1).unwrap();

        assert_eq!(first.capital_at_period_start, dec!(10000));
        assert_eq!(first.interest_for_period, dec!(95));
        assert_eq!(first.calculated_installment_amount, dec!(886));
        assert_eq!(first.amortization, dec!(791));
        assert_eq!(first.capital_at_period_end, dec!(9209));

        let second = schedule.entry(2).unwrap();
        assert_eq!(second.capital_at_period_start, first.capital_at_period_end);
    }

    #[test]
    fn test_final_installment_retires_capital() {
        let schedule =
            AmortizationSchedule::generate(dec!(10000), dec!(50), 6, PaymentFrequency::Monthly)
                .unwrap();
        let last = schedule.entry(6).unwrap();

        assert_eq!(last.amortization, last.capital_at_period_start);
        assert_eq!(
            last.calculated_installment_amount,
            last.capital_at_period_start + last.interest_for_period
        );
    }

    #[test]
    fn test_interest_rounds_up() {
        let schedule =
            AmortizationSchedule::generate(dec!(1000), dec!(10), 4, PaymentFrequency::Monthly)
                .unwrap();
        for entry in &schedule.entries {
            assert_eq!(entry.interest_for_period, entry.interest_for_period.ceil());
            assert!(entry.interest_for_period > Decimal::ZERO);
        }
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_schedule() {
        let f = PaymentFrequency::Monthly;
        assert!(AmortizationSchedule::generate(dec!(0), dec!(10), 12, f)
            .unwrap()
            .is_empty());
        assert!(AmortizationSchedule::generate(dec!(-1), dec!(10), 12, f)
            .unwrap()
            .is_empty());
        assert!(AmortizationSchedule::generate(dec!(1000), dec!(10), 0, f)
            .unwrap()
            .is_empty());
        assert!(AmortizationSchedule::generate(dec!(1000), dec!(-1), 12, f)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_overflowing_compounding_is_rejected() {
        // 1000% a year is ~22% a month; over 1200 months the factor overflows
        let result =
            AmortizationSchedule::generate(dec!(1000), dec!(1000), 1200, PaymentFrequency::Monthly);
        assert!(matches!(result, Err(DomainError::InvalidRate(_))));

        // Same rate over a short term is a regular annuity, not a linear split
        let schedule =
            AmortizationSchedule::generate(dec!(1000), dec!(1000), 2, PaymentFrequency::Annually)
                .unwrap();
        assert_eq!(schedule.entry(1).unwrap().interest_for_period, dec!(10000));
        assert_eq!(schedule.total_amortization(), dec!(1000));
    }

    #[test]
    fn test_entry_lookup_bounds() {
        let schedule =
            AmortizationSchedule::generate(dec!(1200), dec!(0), 12, PaymentFrequency::Monthly)
                .unwrap();
        assert!(schedule.entry(0).is_none());
        assert!(schedule.entry(13).is_none());
        assert_eq!(schedule.entry(12).unwrap().installment_number, 12);
    }
}
