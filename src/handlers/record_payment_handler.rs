//! Record Payment Handler
//!
//! Posts a payment: installment resolution, split, balance update and
//! idempotency bookkeeping all commit in one serializable transaction.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::idempotency::{IdempotencyClaim, IdempotencyRepository};
use crate::ledger::{LedgerRepository, LedgerStoreError, PaymentRequest};

use super::{retry_serializable, RecordPaymentCommand, RecordPaymentResult, DEFAULT_MAX_ATTEMPTS};

/// Handler for recording payments
pub struct RecordPaymentHandler {
    ledger: LedgerRepository,
    idempotency: IdempotencyRepository,
    max_attempts: u32,
}

impl RecordPaymentHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool),
            idempotency: IdempotencyRepository::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute the record-payment command
    pub async fn execute(
        &self,
        command: RecordPaymentCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<RecordPaymentResult, AppError> {
        let organization_id = context.resolve_organization()?;
        let request = command.to_request()?;

        let request_hash = match idempotency_key {
            Some(_) => {
                let canonical = serde_json::to_vec(&command)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                Some(IdempotencyRepository::compute_request_hash(&canonical))
            }
            None => None,
        };

        let key = idempotency_key.zip(request_hash);
        let (request, key) = (&request, key.as_ref());

        retry_serializable("record_payment", self.max_attempts, move || {
            self.try_execute(organization_id, command.account_id, request, key)
        })
        .await
    }

    /// Single transaction attempt
    async fn try_execute(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
        request: &PaymentRequest,
        idempotency: Option<&(Uuid, String)>,
    ) -> Result<RecordPaymentResult, AppError> {
        let mut tx = self.ledger.begin().await?;

        if let Some((key, hash)) = idempotency {
            let claim = self
                .idempotency
                .claim(&mut tx, organization_id, *key, hash)
                .await?;

            if let IdempotencyClaim::Replay(body) = claim {
                let mut result: RecordPaymentResult = serde_json::from_value(body)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                result.replayed = true;

                tracing::info!(
                    idempotency_key = %key,
                    payment_id = %result.payment_id,
                    "Replaying completed payment"
                );
                return Ok(result);
            }
        }

        let mut book = self
            .ledger
            .lock_book(&mut tx, organization_id, account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        let posting = book.record_payment(request.clone())?;
        self.ledger.write_payment_posting(&mut tx, &posting).await?;

        let result = RecordPaymentResult::from(&posting);

        if let Some((key, _)) = idempotency {
            let body =
                serde_json::to_value(&result).map_err(|e| AppError::Internal(e.to_string()))?;
            self.idempotency
                .complete(&mut tx, organization_id, *key, &body)
                .await?;
        }

        tx.commit().await.map_err(LedgerStoreError::from)?;

        tracing::info!(
            account_id = %account_id,
            payment_id = %posting.payment.id,
            installment_number = posting.payment.installment_number,
            amount_paid = %posting.payment.amount_paid,
            remaining_amount = %posting.account_update.remaining_amount,
            status = %posting.account_update.status,
            surplus = posting.split.surplus,
            "Payment recorded"
        );

        Ok(result)
    }
}
