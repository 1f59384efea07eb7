//! Payment ledger rows.
//!
//! Rows are append-only. Reversal never deletes: the original row is flagged
//! `D` (debe), a mirrored `H` (haber) row is appended, and a fresh pending
//! placeholder reopens the installment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted code for an annulled original entry
pub const VERSION_DEBIT: &str = "D";

/// Persisted code for a compensating entry
pub const VERSION_CREDIT: &str = "H";

/// Lifecycle state of a ledger row.
///
/// Stored as the nullable `installment_version` code plus the nullable
/// payment date; `Scheduled` and `Paid` both persist a null code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Pending placeholder spawned by a reversal
    Scheduled,
    /// Effective payment
    Paid,
    /// Original entry annulled by a reversal (`D`)
    Reversed,
    /// Compensating mirror of a reversed entry (`H`)
    CompensatingCredit,
}

/// Unrecognized `installment_version` code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown installment version code: {0}")]
pub struct UnknownVersionCode(pub String);

impl PaymentState {
    pub fn from_stored(
        version: Option<&str>,
        payment_date: Option<NaiveDate>,
    ) -> Result<Self, UnknownVersionCode> {
        match version {
            None if payment_date.is_none() => Ok(PaymentState::Scheduled),
            None => Ok(PaymentState::Paid),
            Some(VERSION_DEBIT) => Ok(PaymentState::Reversed),
            Some(VERSION_CREDIT) => Ok(PaymentState::CompensatingCredit),
            Some(other) => Err(UnknownVersionCode(other.to_string())),
        }
    }

    pub fn version_code(&self) -> Option<&'static str> {
        match self {
            PaymentState::Scheduled | PaymentState::Paid => None,
            PaymentState::Reversed => Some(VERSION_DEBIT),
            PaymentState::CompensatingCredit => Some(VERSION_CREDIT),
        }
    }

    /// Rows with a null version code; these count as consumed installments.
    pub fn counts_as_installment(&self) -> bool {
        matches!(self, PaymentState::Scheduled | PaymentState::Paid)
    }

    pub fn is_annulled(&self) -> bool {
        matches!(
            self,
            PaymentState::Reversed | PaymentState::CompensatingCredit
        )
    }
}

/// A row of the payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub current_account_id: Uuid,
    pub organization_id: Uuid,
    pub amount_paid: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
    pub installment_number: i32,
    pub state: PaymentState,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn version_code(&self) -> Option<&'static str> {
        self.state.version_code()
    }

    /// Mirror of this row with the `H` code, appended when it is reversed.
    pub fn compensating_entry(&self) -> Payment {
        let notes = match self.notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => format!("{notes} (Anulación H)"),
            _ => format!(
                "Anulación H del pago de la cuota {}",
                self.installment_number
            ),
        };

        Payment {
            id: Uuid::new_v4(),
            current_account_id: self.current_account_id,
            organization_id: self.organization_id,
            amount_paid: self.amount_paid,
            payment_date: self.payment_date,
            payment_method: self.payment_method.clone(),
            transaction_reference: self.transaction_reference.clone(),
            notes: Some(notes),
            installment_number: self.installment_number,
            state: PaymentState::CompensatingCredit,
            created_at: Utc::now(),
        }
    }

    /// Pending placeholder reopening this row's installment.
    pub fn pending_placeholder(&self) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            current_account_id: self.current_account_id,
            organization_id: self.organization_id,
            amount_paid: self.amount_paid,
            payment_date: None,
            payment_method: None,
            transaction_reference: None,
            notes: Some(format!(
                "Cuota {} pendiente tras anulación del pago {}",
                self.installment_number, self.id
            )),
            installment_number: self.installment_number,
            state: PaymentState::Scheduled,
            created_at: Utc::now(),
        }
    }
}
