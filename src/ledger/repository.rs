//! Ledger Repository
//!
//! PostgreSQL access for accounts and payment rows. Every query is scoped by
//! organization. Writes run inside a caller-owned serializable transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    AccountStatus, AccountUpdate, CurrentAccount, Payment, PaymentFrequency, PaymentState,
};

use super::book::{LedgerBook, PaymentPosting, ReversalPosting};
use super::error::LedgerStoreError;

const ACCOUNT_COLUMNS: &str = r#"
    id, organization_id, customer_reference, total_amount, down_payment,
    number_of_installments, interest_rate, payment_frequency, start_date,
    remaining_amount, installment_amount, next_due_date, status
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, current_account_id, organization_id, amount_paid, payment_date,
    payment_method, transaction_reference, notes, installment_number,
    installment_version, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    organization_id: Uuid,
    customer_reference: Option<String>,
    total_amount: Decimal,
    down_payment: Decimal,
    number_of_installments: i32,
    interest_rate: Option<Decimal>,
    payment_frequency: String,
    start_date: NaiveDate,
    remaining_amount: Decimal,
    installment_amount: Decimal,
    next_due_date: Option<NaiveDate>,
    status: String,
}

impl TryFrom<AccountRow> for CurrentAccount {
    type Error = LedgerStoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let status: AccountStatus = row.status.parse().map_err(|e: String| {
            LedgerStoreError::InvalidRow(format!("account {}: {}", row.id, e))
        })?;

        Ok(CurrentAccount {
            id: row.id,
            organization_id: row.organization_id,
            customer_reference: row.customer_reference,
            total_amount: row.total_amount,
            down_payment: row.down_payment,
            number_of_installments: row.number_of_installments,
            interest_rate: row.interest_rate,
            payment_frequency: PaymentFrequency::parse_lenient(&row.payment_frequency),
            start_date: row.start_date,
            remaining_amount: row.remaining_amount,
            installment_amount: row.installment_amount,
            next_due_date: row.next_due_date,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    current_account_id: Uuid,
    organization_id: Uuid,
    amount_paid: Decimal,
    payment_date: Option<NaiveDate>,
    payment_method: Option<String>,
    transaction_reference: Option<String>,
    notes: Option<String>,
    installment_number: i32,
    installment_version: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerStoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let state = PaymentState::from_stored(row.installment_version.as_deref(), row.payment_date)
            .map_err(|e| LedgerStoreError::InvalidRow(format!("payment {}: {}", row.id, e)))?;

        Ok(Payment {
            id: row.id,
            current_account_id: row.current_account_id,
            organization_id: row.organization_id,
            amount_paid: row.amount_paid,
            payment_date: row.payment_date,
            payment_method: row.payment_method,
            transaction_reference: row.transaction_reference,
            notes: row.notes,
            installment_number: row.installment_number,
            state,
            created_at: row.created_at,
        })
    }
}

/// Where a payment stands before it is reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentLookup {
    /// Row already carries a `D` or `H` code
    pub annulled: bool,
    /// Owning account, `None` when it cannot be joined
    pub account_id: Option<Uuid>,
}

/// Repository for the ledger tables
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a transaction at SERIALIZABLE isolation
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, LedgerStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    // =========================================================================
    // Transactional reads
    // =========================================================================

    /// Lock the account row and load its full ledger
    pub async fn lock_book(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<LedgerBook>, LedgerStoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM current_accounts \
             WHERE id = $1 AND organization_id = $2 FOR UPDATE"
        ))
        .bind(account_id)
        .bind(organization_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let account = CurrentAccount::try_from(row)?;

        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM current_account_payments \
             WHERE current_account_id = $1 AND organization_id = $2 \
             ORDER BY installment_number, created_at"
        ))
        .bind(account_id)
        .bind(organization_id)
        .fetch_all(&mut **tx)
        .await?;

        let payments = rows
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(LedgerBook::new(account, payments)))
    }

    /// Look up a payment's version code and owning account.
    ///
    /// `None` when the payment is unknown to the organization.
    pub async fn find_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<PaymentLookup>, LedgerStoreError> {
        let row: Option<(Option<String>, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT p.installment_version, a.id
            FROM current_account_payments p
            LEFT JOIN current_accounts a
                ON a.id = p.current_account_id AND a.organization_id = p.organization_id
            WHERE p.id = $1 AND p.organization_id = $2
            "#,
        )
        .bind(payment_id)
        .bind(organization_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|(version, account_id)| PaymentLookup {
            annulled: version.is_some(),
            account_id,
        }))
    }

    // =========================================================================
    // Transactional writes
    // =========================================================================

    pub async fn insert_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account: &CurrentAccount,
    ) -> Result<(), LedgerStoreError> {
        sqlx::query(&format!(
            "INSERT INTO current_accounts ({ACCOUNT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(account.id)
        .bind(account.organization_id)
        .bind(&account.customer_reference)
        .bind(account.total_amount)
        .bind(account.down_payment)
        .bind(account.number_of_installments)
        .bind(account.interest_rate)
        .bind(account.payment_frequency.as_str())
        .bind(account.start_date)
        .bind(account.remaining_amount)
        .bind(account.installment_amount)
        .bind(account.next_due_date)
        .bind(account.status.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn insert_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<(), LedgerStoreError> {
        sqlx::query(&format!(
            "INSERT INTO current_account_payments ({PAYMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(payment.id)
        .bind(payment.current_account_id)
        .bind(payment.organization_id)
        .bind(payment.amount_paid)
        .bind(payment.payment_date)
        .bind(&payment.payment_method)
        .bind(&payment.transaction_reference)
        .bind(&payment.notes)
        .bind(payment.installment_number)
        .bind(payment.version_code())
        .bind(payment.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Fill a pending placeholder row with the settling payment
    pub async fn settle_placeholder(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<(), LedgerStoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE current_account_payments
            SET amount_paid = $3,
                payment_date = $4,
                payment_method = $5,
                transaction_reference = $6,
                notes = $7
            WHERE id = $1 AND organization_id = $2
              AND installment_version IS NULL AND payment_date IS NULL
            "#,
        )
        .bind(payment.id)
        .bind(payment.organization_id)
        .bind(payment.amount_paid)
        .bind(payment.payment_date)
        .bind(&payment.payment_method)
        .bind(&payment.transaction_reference)
        .bind(&payment.notes)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows != 1 {
            return Err(LedgerStoreError::InvalidRow(format!(
                "payment {} is not a pending placeholder",
                payment.id
            )));
        }

        Ok(())
    }

    /// Flag an effective row as annulled (`D`)
    pub async fn mark_annulled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), LedgerStoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE current_account_payments
            SET installment_version = $3
            WHERE id = $1 AND organization_id = $2 AND installment_version IS NULL
            "#,
        )
        .bind(payment_id)
        .bind(organization_id)
        .bind(PaymentState::Reversed.version_code())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows != 1 {
            return Err(LedgerStoreError::InvalidRow(format!(
                "payment {} is not an effective row",
                payment_id
            )));
        }

        Ok(())
    }

    pub async fn update_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        account_id: Uuid,
        update: &AccountUpdate,
    ) -> Result<(), LedgerStoreError> {
        sqlx::query(
            r#"
            UPDATE current_accounts
            SET remaining_amount = $3,
                installment_amount = $4,
                next_due_date = $5,
                status = $6,
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(account_id)
        .bind(organization_id)
        .bind(update.remaining_amount)
        .bind(update.installment_amount)
        .bind(update.next_due_date)
        .bind(update.status.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Write a recorded payment and the account update it produced
    pub async fn write_payment_posting(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        posting: &PaymentPosting,
    ) -> Result<(), LedgerStoreError> {
        if posting.settles_placeholder {
            self.settle_placeholder(tx, &posting.payment).await?;
        } else {
            self.insert_payment(tx, &posting.payment).await?;
        }

        self.update_account(
            tx,
            posting.payment.organization_id,
            posting.payment.current_account_id,
            &posting.account_update,
        )
        .await
    }

    /// Write the D flag, the H mirror, the pending placeholder and the
    /// account update of a reversal
    pub async fn write_reversal_posting(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        posting: &ReversalPosting,
    ) -> Result<(), LedgerStoreError> {
        let organization_id = posting.compensating_entry.organization_id;

        self.mark_annulled(tx, organization_id, posting.annulled_payment_id)
            .await?;
        self.insert_payment(tx, &posting.compensating_entry).await?;
        self.insert_payment(tx, &posting.pending_placeholder).await?;

        self.update_account(
            tx,
            organization_id,
            posting.compensating_entry.current_account_id,
            &posting.account_update,
        )
        .await
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub async fn get_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<CurrentAccount>, LedgerStoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM current_accounts \
             WHERE id = $1 AND organization_id = $2"
        ))
        .bind(account_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CurrentAccount::try_from).transpose()
    }

    /// All ledger rows of an account, D/H rows included
    pub async fn list_payments(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<Vec<Payment>, LedgerStoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM current_account_payments \
             WHERE current_account_id = $1 AND organization_id = $2 \
             ORDER BY installment_number, created_at"
        ))
        .bind(account_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment_row(version: Option<&str>, date: Option<NaiveDate>) -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            current_account_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            amount_paid: dec!(250),
            payment_date: date,
            payment_method: None,
            transaction_reference: None,
            notes: None,
            installment_number: 2,
            installment_version: version.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_row_states() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1);

        let p = Payment::try_from(payment_row(None, date)).unwrap();
        assert_eq!(p.state, PaymentState::Paid);

        let p = Payment::try_from(payment_row(None, None)).unwrap();
        assert_eq!(p.state, PaymentState::Scheduled);

        let p = Payment::try_from(payment_row(Some("D"), date)).unwrap();
        assert_eq!(p.state, PaymentState::Reversed);

        let p = Payment::try_from(payment_row(Some("H"), date)).unwrap();
        assert_eq!(p.state, PaymentState::CompensatingCredit);
    }

    #[test]
    fn test_unknown_version_code_is_invalid_row() {
        let err = Payment::try_from(payment_row(Some("X"), None)).unwrap_err();
        assert!(matches!(err, LedgerStoreError::InvalidRow(_)));
    }

    #[test]
    fn test_account_row_with_unknown_status() {
        let row = AccountRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            customer_reference: None,
            total_amount: dec!(1000),
            down_payment: dec!(0),
            number_of_installments: 4,
            interest_rate: None,
            payment_frequency: "MONTHLY".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            remaining_amount: dec!(1000),
            installment_amount: dec!(250),
            next_due_date: None,
            status: "FROZEN".to_string(),
        };
        assert!(matches!(
            CurrentAccount::try_from(row),
            Err(LedgerStoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_account_row_with_unknown_frequency_defaults_monthly() {
        let row = AccountRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            customer_reference: Some("CLI-1".to_string()),
            total_amount: dec!(1000),
            down_payment: dec!(0),
            number_of_installments: 4,
            interest_rate: Some(dec!(10)),
            payment_frequency: "FORTNIGHTLY".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            remaining_amount: dec!(1000),
            installment_amount: dec!(250),
            next_due_date: None,
            status: "ACTIVE".to_string(),
        };
        let account = CurrentAccount::try_from(row).unwrap();
        assert_eq!(account.payment_frequency, PaymentFrequency::Monthly);
        assert_eq!(account.status, AccountStatus::Active);
    }
}
