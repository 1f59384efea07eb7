//! Opening a current account.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::AmortizationSchedule;
use crate::domain::amount::non_negative;
use crate::domain::{AccountStatus, Amount, CurrentAccount, DomainError, PaymentFrequency};

/// Longest plan an account may carry (100 years of monthly installments)
pub const MAX_INSTALLMENTS: i32 = 1200;

/// Highest nominal annual percentage accepted
pub const MAX_INTEREST_RATE: Decimal = Decimal::ONE_THOUSAND;

/// Decimal places stored for the interest rate
const RATE_SCALE: u32 = 4;

/// Financing terms fixed when the account is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTerms {
    pub customer_reference: Option<String>,
    pub total_amount: Amount,
    pub down_payment: Decimal,
    pub number_of_installments: i32,
    pub interest_rate: Option<Decimal>,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
}

impl AccountTerms {
    pub fn validate(&self) -> Result<(), DomainError> {
        let down_payment = non_negative(self.down_payment, "down_payment")
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        if down_payment > self.total_amount.value() {
            return Err(DomainError::InvalidAmount(format!(
                "down_payment {} exceeds total_amount {}",
                down_payment, self.total_amount
            )));
        }

        if !(1..=MAX_INSTALLMENTS).contains(&self.number_of_installments) {
            return Err(DomainError::InvalidInstallmentCount(
                self.number_of_installments,
            ));
        }

        match self.interest_rate {
            Some(rate)
                if rate < Decimal::ZERO
                    || rate > MAX_INTEREST_RATE
                    || rate.normalize().scale() > RATE_SCALE =>
            {
                Err(DomainError::InvalidRate(rate))
            }
            _ => Ok(()),
        }
    }
}

/// Build a fresh account from its terms, together with its original plan.
///
/// The opening installment is the first scheduled amount; an account with
/// nothing financed opens already paid off.
pub fn open_account(
    id: Uuid,
    organization_id: Uuid,
    terms: AccountTerms,
) -> Result<(CurrentAccount, AmortizationSchedule), DomainError> {
    terms.validate()?;

    let principal = terms.total_amount.value() - terms.down_payment;
    let schedule = AmortizationSchedule::generate(
        principal,
        terms.interest_rate.unwrap_or(Decimal::ZERO),
        terms.number_of_installments,
        terms.payment_frequency,
    )?;

    let installment_amount = schedule
        .entry(1)
        .map(|e| e.calculated_installment_amount)
        .unwrap_or(Decimal::ZERO);

    let status = AccountStatus::for_balance(principal);
    let next_due_date = match status {
        AccountStatus::PaidOff => None,
        AccountStatus::Active => terms.payment_frequency.due_date(
            terms.start_date,
            0,
            terms.number_of_installments,
        ),
    };

    let account = CurrentAccount {
        id,
        organization_id,
        customer_reference: terms.customer_reference,
        total_amount: terms.total_amount.value(),
        down_payment: terms.down_payment,
        number_of_installments: terms.number_of_installments,
        interest_rate: terms.interest_rate,
        payment_frequency: terms.payment_frequency,
        start_date: terms.start_date,
        remaining_amount: principal,
        installment_amount,
        next_due_date,
        status,
    };

    Ok((account, schedule))
}
