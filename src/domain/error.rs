//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations and invariant failures of the installment ledger.
///
/// These are independent of the web/infrastructure layer and are always
/// detected before anything is written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Installment number outside `1..=number_of_installments`
    #[error("Invalid installment number {number}: must be between 1 and {max}")]
    InvalidInstallment { number: i32, max: i32 },

    /// Account opened with fewer than one installment
    #[error("Invalid number of installments: {0}")]
    InvalidInstallmentCount(i32),

    /// An effective payment already occupies the installment
    #[error("Installment {number} is already paid")]
    InstallmentAlreadyPaid { number: i32 },

    /// Every installment has been consumed
    #[error("Payment schedule exhausted: all {number_of_installments} installments are recorded")]
    ScheduleExhausted { number_of_installments: i32 },

    /// Payment was already reversed, or is itself a compensating entry
    #[error("Payment {payment_id} is already annulled")]
    AlreadyAnnulled { payment_id: Uuid },

    /// Payment is a pending placeholder and was never paid
    #[error("Payment {payment_id} is pending and cannot be reversed")]
    PaymentPending { payment_id: Uuid },

    /// Account has no outstanding balance
    #[error("Account {account_id} is already paid off")]
    AccountPaidOff { account_id: Uuid },

    /// Payment absent from the account's ledger
    #[error("Payment not found: {payment_id}")]
    PaymentNotFound { payment_id: Uuid },

    /// Payment row is not linked to any account
    #[error("Payment {payment_id} has no associated account")]
    MissingAccount { payment_id: Uuid },

    /// Interest rate cannot be converted to a periodic rate
    #[error("Invalid interest rate: {0}")]
    InvalidRate(Decimal),

    /// No tenant could be resolved for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    /// Check if this is a validation error (malformed input)
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidInstallment { .. }
                | Self::InvalidInstallmentCount(_)
                | Self::InvalidRate(_)
        )
    }

    /// Check if this is a missing-reference error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PaymentNotFound { .. } | Self::MissingAccount { .. }
        )
    }

    /// Check if this is a business-rule violation on otherwise valid input
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::InstallmentAlreadyPaid { .. }
                | Self::ScheduleExhausted { .. }
                | Self::AlreadyAnnulled { .. }
                | Self::PaymentPending { .. }
                | Self::AccountPaidOff { .. }
        )
    }
}
