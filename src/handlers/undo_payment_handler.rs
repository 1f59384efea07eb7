//! Undo Payment Handler
//!
//! Reverses a payment with a D/H compensating pair and a pending
//! placeholder, inside one serializable transaction.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::{LedgerRepository, LedgerStoreError};

use super::{retry_serializable, UndoPaymentCommand, UndoPaymentResult, DEFAULT_MAX_ATTEMPTS};

/// Handler for payment reversals
pub struct UndoPaymentHandler {
    ledger: LedgerRepository,
    max_attempts: u32,
}

impl UndoPaymentHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute the undo command
    pub async fn execute(
        &self,
        command: UndoPaymentCommand,
        context: &OperationContext,
    ) -> Result<UndoPaymentResult, AppError> {
        let organization_id = context.resolve_organization()?;
        let payment_id = command.payment_id;

        retry_serializable("undo_payment", self.max_attempts, move || {
            self.try_execute(organization_id, payment_id)
        })
        .await
    }

    async fn try_execute(
        &self,
        organization_id: Uuid,
        payment_id: Uuid,
    ) -> Result<UndoPaymentResult, AppError> {
        let mut tx = self.ledger.begin().await?;

        let lookup = self
            .ledger
            .find_payment(&mut tx, organization_id, payment_id)
            .await?
            .ok_or_else(|| AppError::PaymentNotFound(payment_id.to_string()))?;

        if lookup.annulled {
            return Err(DomainError::AlreadyAnnulled { payment_id }.into());
        }

        let account_id = lookup
            .account_id
            .ok_or(DomainError::MissingAccount { payment_id })?;

        let mut book = self
            .ledger
            .lock_book(&mut tx, organization_id, account_id)
            .await?
            .ok_or(DomainError::MissingAccount { payment_id })?;

        let posting = book.undo_payment(payment_id)?;
        self.ledger.write_reversal_posting(&mut tx, &posting).await?;

        tx.commit().await.map_err(LedgerStoreError::from)?;

        tracing::info!(
            account_id = %account_id,
            payment_id = %payment_id,
            compensating_payment_id = %posting.compensating_entry.id,
            pending_payment_id = %posting.pending_placeholder.id,
            installment_number = posting.compensating_entry.installment_number,
            remaining_amount = %posting.restored_amount,
            "Payment annulled"
        );

        Ok(UndoPaymentResult::from(&posting))
    }
}
