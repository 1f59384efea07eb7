//! Payment splitting.
//!
//! Splits an incoming amount into interest and amortization against the
//! account's original plan and applies the surplus policy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::{fixed_installment, periodic_rate, AmortizationSchedule};
use crate::domain::{AccountStatus, Amount, CurrentAccount, DomainError};

/// A payment above the reference installment by more than this is a surplus.
pub const SURPLUS_TOLERANCE: Decimal = Decimal::ONE;

/// What to do with an overpayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurplusAction {
    /// Spread the reduced balance over the remaining installments
    #[default]
    Recalculate,
    /// Keep the installment amount; only the balance shrinks
    ReduceInstallments,
}

impl SurplusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurplusAction::Recalculate => "RECALCULATE",
            SurplusAction::ReduceInstallments => "REDUCE_INSTALLMENTS",
        }
    }

    /// Unrecognized policies fall back to `Recalculate`.
    pub fn parse_lenient(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "REDUCE_INSTALLMENTS" => SurplusAction::ReduceInstallments,
            "RECALCULATE" => SurplusAction::Recalculate,
            other => {
                tracing::warn!(surplus_action = %other, "Unknown surplus action, recalculating");
                SurplusAction::Recalculate
            }
        }
    }
}

/// Breakdown of one payment and the account state it leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub installment_number: i32,
    pub capital_at_start: Decimal,
    pub interest_component: Decimal,
    pub amortization_component: Decimal,
    pub new_principal_balance: Decimal,
    pub reference_installment: Decimal,
    pub surplus: bool,
    pub new_installment_amount: Decimal,
    pub status: AccountStatus,
}

/// Plan computed from the financed principal at creation.
///
/// Empty for interest-free accounts and accounts with nothing financed.
pub fn original_plan(account: &CurrentAccount) -> Result<AmortizationSchedule, DomainError> {
    let principal = account.financial_principal();

    if !account.bears_interest() || principal <= Decimal::ZERO {
        return Ok(AmortizationSchedule::empty(principal));
    }

    AmortizationSchedule::generate(
        principal,
        account.annual_rate(),
        account.number_of_installments,
        account.payment_frequency,
    )
}

/// Split `amount` paid toward installment `installment_number`.
pub fn split_payment(
    account: &CurrentAccount,
    installment_number: i32,
    amount: &Amount,
    action: SurplusAction,
) -> Result<PaymentSplit, DomainError> {
    let plan = original_plan(account)?;
    let entry = plan.entry(installment_number);
    let rate = periodic_rate(account.annual_rate(), account.payment_frequency)?;
    let paid = amount.value();

    // Interest-free accounts have no plan and fall back to the live balance.
    let capital_at_start = entry
        .map(|e| e.capital_at_period_start)
        .unwrap_or(account.remaining_amount);

    let interest_component = (capital_at_start * rate).ceil();
    let amortization_component = (paid - interest_component).max(Decimal::ZERO);
    let new_principal_balance = (capital_at_start - amortization_component).max(Decimal::ZERO);

    let reference_installment = entry
        .map(|e| e.calculated_installment_amount)
        .unwrap_or(account.installment_amount);
    let surplus = paid > reference_installment + SURPLUS_TOLERANCE;

    let new_installment_amount = match (surplus, action) {
        (true, SurplusAction::Recalculate) => {
            let remaining = account.number_of_installments - installment_number;
            fixed_installment(new_principal_balance, rate, remaining)
        }
        _ => account.installment_amount,
    };

    Ok(PaymentSplit {
        installment_number,
        capital_at_start,
        interest_component,
        amortization_component,
        new_principal_balance,
        reference_installment,
        surplus,
        new_installment_amount,
        status: AccountStatus::for_balance(new_principal_balance),
    })
}
