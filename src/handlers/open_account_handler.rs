//! Open Account Handler
//!
//! Creates a current account and its opening balance.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ledger::{open_account, LedgerRepository, LedgerStoreError};

use super::{OpenAccountCommand, OpenAccountResult};

/// Handler for opening accounts
pub struct OpenAccountHandler {
    ledger: LedgerRepository,
}

impl OpenAccountHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool),
        }
    }

    /// Execute the open-account command
    pub async fn execute(
        &self,
        command: OpenAccountCommand,
        context: &OperationContext,
    ) -> Result<OpenAccountResult, AppError> {
        let organization_id = context.resolve_organization()?;
        let terms = command.to_terms()?;

        let (account, schedule) = open_account(Uuid::new_v4(), organization_id, terms)?;

        let mut tx = self.ledger.begin().await?;
        self.ledger.insert_account(&mut tx, &account).await?;
        tx.commit().await.map_err(LedgerStoreError::from)?;

        tracing::info!(
            account_id = %account.id,
            organization_id = %organization_id,
            principal = %account.remaining_amount,
            installment_amount = %account.installment_amount,
            number_of_installments = account.number_of_installments,
            "Current account opened"
        );

        Ok(OpenAccountResult {
            message: format!(
                "Account opened with {} installments of {}",
                account.number_of_installments, account.installment_amount
            ),
            account,
            schedule: schedule.entries,
        })
    }
}
