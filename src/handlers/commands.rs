//! Command definitions
//!
//! Commands represent intentions to change the ledger; results are what the
//! API returns once they are committed.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::ScheduleEntry;
use crate::domain::{AccountStatus, Amount, CurrentAccount, PaymentFrequency};
use crate::error::AppError;
use crate::ledger::{AccountTerms, PaymentPosting, PaymentRequest, ReversalPosting, SurplusAction};

/// Column widths of the free-text fields
pub const MAX_CUSTOMER_REFERENCE_LEN: usize = 100;
pub const MAX_PAYMENT_METHOD_LEN: usize = 50;
pub const MAX_TRANSACTION_REFERENCE_LEN: usize = 100;

fn check_length(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::InvalidRequest(format!(
            "{field} exceeds {max} characters"
        ))),
        _ => Ok(()),
    }
}

// =========================================================================
// OpenAccountCommand
// =========================================================================

/// Command to open a financed-sale current account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountCommand {
    pub customer_reference: Option<String>,
    /// Sale total (as string for precise decimal)
    pub total_amount: String,
    #[serde(default)]
    pub down_payment: Option<String>,
    pub number_of_installments: i32,
    /// Annual nominal percentage; null means interest-free
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    pub payment_frequency: String,
    pub start_date: NaiveDate,
}

impl OpenAccountCommand {
    pub fn new(
        total_amount: String,
        number_of_installments: i32,
        payment_frequency: PaymentFrequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            customer_reference: None,
            total_amount,
            down_payment: None,
            number_of_installments,
            interest_rate: None,
            payment_frequency: payment_frequency.as_str().to_string(),
            start_date,
        }
    }

    pub fn with_down_payment(mut self, down_payment: String) -> Self {
        self.down_payment = Some(down_payment);
        self
    }

    pub fn with_interest_rate(mut self, interest_rate: Decimal) -> Self {
        self.interest_rate = Some(interest_rate);
        self
    }

    pub fn with_customer_reference(mut self, reference: String) -> Self {
        self.customer_reference = Some(reference);
        self
    }

    /// Parse into validated terms
    pub fn to_terms(&self) -> Result<AccountTerms, AppError> {
        check_length(
            "customer_reference",
            self.customer_reference.as_deref(),
            MAX_CUSTOMER_REFERENCE_LEN,
        )?;

        let total_amount: Amount = self
            .total_amount
            .parse()
            .map_err(|e| AppError::InvalidRequest(format!("Invalid total_amount: {}", e)))?;

        let down_payment = match self.down_payment.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<Decimal>()
                .map_err(|e| AppError::InvalidRequest(format!("Invalid down_payment: {}", e)))?,
            None => Decimal::ZERO,
        };

        let terms = AccountTerms {
            customer_reference: self.customer_reference.clone(),
            total_amount,
            down_payment,
            number_of_installments: self.number_of_installments,
            interest_rate: self.interest_rate,
            payment_frequency: PaymentFrequency::parse_lenient(&self.payment_frequency),
            start_date: self.start_date,
        };
        terms.validate()?;

        Ok(terms)
    }
}

// =========================================================================
// RecordPaymentCommand
// =========================================================================

/// Command to record a payment against an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentCommand {
    pub account_id: Uuid,
    /// Amount paid (as string for precise decimal)
    pub amount_paid: String,
    /// Defaults to today (UTC)
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Next free installment when absent
    #[serde(default)]
    pub installment_number: Option<i32>,
    /// RECALCULATE or REDUCE_INSTALLMENTS; RECALCULATE when absent
    #[serde(default)]
    pub surplus_action: Option<String>,
}

impl RecordPaymentCommand {
    pub fn new(account_id: Uuid, amount_paid: String) -> Self {
        Self {
            account_id,
            amount_paid,
            payment_date: None,
            payment_method: None,
            transaction_reference: None,
            notes: None,
            installment_number: None,
            surplus_action: None,
        }
    }

    pub fn with_installment(mut self, installment_number: i32) -> Self {
        self.installment_number = Some(installment_number);
        self
    }

    pub fn with_payment_date(mut self, payment_date: NaiveDate) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    pub fn with_method(mut self, method: String) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.transaction_reference = Some(reference);
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn with_surplus_action(mut self, action: SurplusAction) -> Self {
        self.surplus_action = Some(action.as_str().to_string());
        self
    }

    /// Parse into a ledger request
    pub fn to_request(&self) -> Result<PaymentRequest, AppError> {
        let amount: Amount = self
            .amount_paid
            .parse()
            .map_err(|e| AppError::InvalidRequest(format!("Invalid amount_paid: {}", e)))?;

        check_length(
            "payment_method",
            self.payment_method.as_deref(),
            MAX_PAYMENT_METHOD_LEN,
        )?;
        check_length(
            "transaction_reference",
            self.transaction_reference.as_deref(),
            MAX_TRANSACTION_REFERENCE_LEN,
        )?;

        if let Some(number) = self.installment_number {
            if number < 1 {
                return Err(AppError::InvalidRequest(format!(
                    "installment_number must be positive (got {})",
                    number
                )));
            }
        }

        Ok(PaymentRequest {
            amount,
            payment_date: self
                .payment_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            payment_method: self.payment_method.clone(),
            transaction_reference: self.transaction_reference.clone(),
            notes: self.notes.clone(),
            installment_number: self.installment_number,
            surplus_action: self
                .surplus_action
                .as_deref()
                .map(SurplusAction::parse_lenient)
                .unwrap_or_default(),
        })
    }
}

// =========================================================================
// UndoPaymentCommand
// =========================================================================

/// Command to reverse a recorded payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoPaymentCommand {
    pub payment_id: Uuid,
}

impl UndoPaymentCommand {
    pub fn new(payment_id: Uuid) -> Self {
        Self { payment_id }
    }
}

// =========================================================================
// Results
// =========================================================================

/// Result of opening an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountResult {
    pub message: String,
    pub account: CurrentAccount,
    pub schedule: Vec<ScheduleEntry>,
}

/// Result of a recorded payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentResult {
    pub message: String,
    pub payment_id: Uuid,
    pub account_id: Uuid,
    pub installment_number: i32,
    pub amount_paid: Decimal,
    pub interest_component: Decimal,
    pub amortization_component: Decimal,
    pub surplus: bool,
    pub remaining_amount: Decimal,
    pub installment_amount: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub status: AccountStatus,
    /// Served from a completed idempotency key
    #[serde(default)]
    pub replayed: bool,
}

impl From<&PaymentPosting> for RecordPaymentResult {
    fn from(posting: &PaymentPosting) -> Self {
        Self {
            message: format!(
                "Payment recorded for installment {}",
                posting.payment.installment_number
            ),
            payment_id: posting.payment.id,
            account_id: posting.payment.current_account_id,
            installment_number: posting.payment.installment_number,
            amount_paid: posting.payment.amount_paid,
            interest_component: posting.split.interest_component,
            amortization_component: posting.split.amortization_component,
            surplus: posting.split.surplus,
            remaining_amount: posting.account_update.remaining_amount,
            installment_amount: posting.account_update.installment_amount,
            next_due_date: posting.account_update.next_due_date,
            status: posting.account_update.status,
            replayed: false,
        }
    }
}

/// Result of a reversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoPaymentResult {
    pub message: String,
    pub annulled_payment_id: Uuid,
    pub compensating_payment_id: Uuid,
    pub pending_payment_id: Uuid,
    pub account_id: Uuid,
    pub installment_number: i32,
    pub remaining_amount: Decimal,
    pub installment_amount: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub status: AccountStatus,
}

impl From<&ReversalPosting> for UndoPaymentResult {
    fn from(posting: &ReversalPosting) -> Self {
        let installment_number = posting.compensating_entry.installment_number;
        Self {
            message: format!("Payment for installment {} annulled", installment_number),
            annulled_payment_id: posting.annulled_payment_id,
            compensating_payment_id: posting.compensating_entry.id,
            pending_payment_id: posting.pending_placeholder.id,
            account_id: posting.compensating_entry.current_account_id,
            installment_number,
            remaining_amount: posting.account_update.remaining_amount,
            installment_amount: posting.account_update.installment_amount,
            next_due_date: posting.account_update.next_due_date,
            status: posting.account_update.status,
        }
    }
}
