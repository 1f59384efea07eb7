//! Current account (one per financed sale).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::PaymentFrequency;

/// Account status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    PaidOff,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::PaidOff => "PAID_OFF",
        }
    }

    /// Status implied by an outstanding balance.
    pub fn for_balance(remaining_amount: Decimal) -> Self {
        if remaining_amount <= Decimal::ZERO {
            AccountStatus::PaidOff
        } else {
            AccountStatus::Active
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "PAID_OFF" => Ok(AccountStatus::PaidOff),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// Financed-sale current account.
///
/// `start_date`, the amounts and the installment count are fixed at creation;
/// only `remaining_amount`, `installment_amount`, `next_due_date` and `status`
/// change, and only through an [`AccountUpdate`] produced by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub customer_reference: Option<String>,
    pub total_amount: Decimal,
    pub down_payment: Decimal,
    pub number_of_installments: i32,
    /// Annual nominal percentage (`50` means 50%)
    pub interest_rate: Option<Decimal>,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    pub remaining_amount: Decimal,
    pub installment_amount: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub status: AccountStatus,
}

impl CurrentAccount {
    /// Amount actually financed.
    pub fn financial_principal(&self) -> Decimal {
        self.total_amount - self.down_payment
    }

    /// Annual rate, with a missing rate read as interest-free.
    pub fn annual_rate(&self) -> Decimal {
        self.interest_rate.unwrap_or(Decimal::ZERO)
    }

    pub fn bears_interest(&self) -> bool {
        self.annual_rate() > Decimal::ZERO
    }

    pub fn is_paid_off(&self) -> bool {
        self.status == AccountStatus::PaidOff
    }

    /// Due date of the zero-based installment index, `None` past the schedule.
    pub fn due_date(&self, installment_index: i32) -> Option<NaiveDate> {
        self.payment_frequency
            .due_date(self.start_date, installment_index, self.number_of_installments)
    }

    pub fn apply(&mut self, update: &AccountUpdate) {
        self.remaining_amount = update.remaining_amount;
        self.installment_amount = update.installment_amount;
        self.next_due_date = update.next_due_date;
        self.status = update.status;
    }
}

/// Mutable account fields written together with a ledger posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub remaining_amount: Decimal,
    pub installment_amount: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub status: AccountStatus,
}
