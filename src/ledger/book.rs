//! Ledger book
//!
//! An account together with its payment rows, as loaded inside one ledger
//! transaction. Postings are computed here in pure code, validated in full
//! before the book is touched, and then written back by the repository.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::{fixed_installment, periodic_rate};
use crate::domain::{
    AccountStatus, AccountUpdate, Amount, CurrentAccount, DomainError, Payment, PaymentState,
};

use super::numbering::{effective_count, resolve_installment};
use super::splitter::{split_payment, PaymentSplit, SurplusAction};

/// A payment to record against the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Amount,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
    /// Explicit installment; the next free one when absent
    pub installment_number: Option<i32>,
    pub surplus_action: SurplusAction,
}

/// Outcome of `record_payment`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPosting {
    pub payment: Payment,
    /// The payment reuses a pending placeholder row rather than a new one
    pub settles_placeholder: bool,
    pub split: PaymentSplit,
    pub account_update: AccountUpdate,
}

/// Outcome of `undo_payment`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalPosting {
    pub annulled_payment_id: Uuid,
    pub compensating_entry: Payment,
    pub pending_placeholder: Payment,
    pub restored_amount: Decimal,
    pub account_update: AccountUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerBook {
    pub account: CurrentAccount,
    pub payments: Vec<Payment>,
}

impl LedgerBook {
    pub fn new(account: CurrentAccount, payments: Vec<Payment>) -> Self {
        Self { account, payments }
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    pub fn effective_count(&self) -> i32 {
        effective_count(&self.payments)
    }

    // =========================================================================
    // Record payment
    // =========================================================================

    /// Post a payment: resolve its installment, split it, and derive the new
    /// balance, installment amount, next due date and status.
    pub fn record_payment(
        &mut self,
        request: PaymentRequest,
    ) -> Result<PaymentPosting, DomainError> {
        if self.account.is_paid_off() {
            return Err(DomainError::AccountPaidOff {
                account_id: self.account.id,
            });
        }

        let slot = resolve_installment(&self.account, &self.payments, request.installment_number)?;
        let split = split_payment(
            &self.account,
            slot.number,
            &request.amount,
            request.surplus_action,
        )?;

        let placeholder = slot
            .pending_placeholder
            .and_then(|id| self.payments.iter().position(|p| p.id == id));

        let payment = Payment {
            id: placeholder
                .map(|idx| self.payments[idx].id)
                .unwrap_or_else(Uuid::new_v4),
            current_account_id: self.account.id,
            organization_id: self.account.organization_id,
            amount_paid: request.amount.value(),
            payment_date: Some(request.payment_date),
            payment_method: request.payment_method,
            transaction_reference: request.transaction_reference,
            notes: request.notes,
            installment_number: slot.number,
            state: PaymentState::Paid,
            created_at: placeholder
                .map(|idx| self.payments[idx].created_at)
                .unwrap_or_else(Utc::now),
        };

        let consumed = match placeholder {
            Some(_) => self.effective_count(),
            None => self.effective_count() + 1,
        };
        let next_due_date = match split.status {
            AccountStatus::PaidOff => None,
            AccountStatus::Active => self.account.due_date(consumed),
        };

        let account_update = AccountUpdate {
            remaining_amount: split.new_principal_balance,
            installment_amount: split.new_installment_amount,
            next_due_date,
            status: split.status,
        };

        match placeholder {
            Some(idx) => self.payments[idx] = payment.clone(),
            None => self.payments.push(payment.clone()),
        }
        self.account.apply(&account_update);

        Ok(PaymentPosting {
            payment,
            settles_placeholder: placeholder.is_some(),
            split,
            account_update,
        })
    }

    // =========================================================================
    // Undo payment
    // =========================================================================

    /// Annul a paid row: flag it `D`, append its `H` mirror and a pending
    /// placeholder, and add the annulled amount back to the balance.
    pub fn undo_payment(&mut self, payment_id: Uuid) -> Result<ReversalPosting, DomainError> {
        let idx = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(DomainError::PaymentNotFound { payment_id })?;

        let original = &self.payments[idx];
        if original.current_account_id != self.account.id {
            return Err(DomainError::MissingAccount { payment_id });
        }

        match original.state {
            PaymentState::Paid => {}
            PaymentState::Scheduled => return Err(DomainError::PaymentPending { payment_id }),
            PaymentState::Reversed | PaymentState::CompensatingCredit => {
                return Err(DomainError::AlreadyAnnulled { payment_id })
            }
        }

        let compensating_entry = original.compensating_entry();
        let pending_placeholder = original.pending_placeholder();
        let installment_number = original.installment_number;
        let restored_amount = self.account.remaining_amount + original.amount_paid;

        // The annulled row leaves the count and the placeholder replaces it.
        let remaining_installments =
            (self.account.number_of_installments - self.effective_count()).max(0);

        let installment_amount = if remaining_installments > 0 {
            let rate = periodic_rate(self.account.annual_rate(), self.account.payment_frequency)?;
            fixed_installment(restored_amount, rate, remaining_installments)
        } else {
            self.account.installment_amount
        };

        let status = AccountStatus::for_balance(restored_amount);
        let next_due_date = self
            .account
            .next_due_date
            .or_else(|| self.account.due_date(installment_number - 1));

        let account_update = AccountUpdate {
            remaining_amount: restored_amount,
            installment_amount,
            next_due_date,
            status,
        };

        self.payments[idx].state = PaymentState::Reversed;
        self.payments.push(compensating_entry.clone());
        self.payments.push(pending_placeholder.clone());
        self.account.apply(&account_update);

        Ok(ReversalPosting {
            annulled_payment_id: payment_id,
            compensating_entry,
            pending_placeholder,
            restored_amount,
            account_update,
        })
    }
}
