//! Account Queries
//!
//! Read side: account snapshot, ledger rows and the original schedule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::amortization::{AmortizationSchedule, ScheduleEntry};
use crate::domain::{CurrentAccount, OperationContext, Payment};
use crate::error::AppError;
use crate::ledger::LedgerRepository;

/// Schedule entry with its due date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    #[serde(flatten)]
    pub entry: ScheduleEntry,
    pub due_date: Option<NaiveDate>,
}

/// Tenant-scoped reads over accounts and their ledgers
pub struct AccountQueries {
    ledger: LedgerRepository,
}

impl AccountQueries {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool),
        }
    }

    pub async fn account(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<CurrentAccount, AppError> {
        let organization_id = context.resolve_organization()?;

        self.ledger
            .get_account(organization_id, account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))
    }

    /// Ledger rows, D/H and pending rows included
    pub async fn payments(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<Vec<Payment>, AppError> {
        let account = self.account(account_id, context).await?;

        Ok(self
            .ledger
            .list_payments(account.organization_id, account.id)
            .await?)
    }

    /// Original plan over the financed principal, annotated with due dates
    pub async fn schedule(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<Vec<ScheduledInstallment>, AppError> {
        let account = self.account(account_id, context).await?;
        Ok(annotated_schedule(&account)?)
    }
}

pub fn annotated_schedule(
    account: &CurrentAccount,
) -> Result<Vec<ScheduledInstallment>, crate::domain::DomainError> {
    let schedule = AmortizationSchedule::generate(
        account.financial_principal(),
        account.annual_rate(),
        account.number_of_installments,
        account.payment_frequency,
    )?;

    Ok(schedule
        .entries
        .into_iter()
        .map(|entry| ScheduledInstallment {
            due_date: account.due_date(entry.installment_number - 1),
            entry,
        })
        .collect())
}
