//! Ledger Integration Tests
//!
//! Handlers against PostgreSQL. Skipped when DATABASE_URL is unset.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use installment_ledger::domain::{
    AccountStatus, DomainError, OperationContext, PaymentFrequency, PaymentState,
};
use installment_ledger::handlers::{
    AccountQueries, OpenAccountCommand, OpenAccountHandler, RecordPaymentCommand,
    RecordPaymentHandler, UndoPaymentCommand, UndoPaymentHandler,
};
use installment_ledger::idempotency::IdempotencyRepository;
use installment_ledger::AppError;

mod common;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

async fn open_interest_free(db: &common::TestDb, total: &str, n: i32) -> Uuid {
    let command = OpenAccountCommand::new(total.to_string(), n, PaymentFrequency::Monthly, start())
        .with_customer_reference("CLI-001".to_string());

    let result = OpenAccountHandler::new(db.pool.clone())
        .execute(command, &db.context())
        .await
        .unwrap();

    result.account.id
}

async fn pay(
    db: &common::TestDb,
    account_id: Uuid,
    amount: &str,
    installment: Option<i32>,
) -> Uuid {
    let mut command = RecordPaymentCommand::new(account_id, amount.to_string())
        .with_payment_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    if let Some(n) = installment {
        command = command.with_installment(n);
    }

    RecordPaymentHandler::new(db.pool.clone())
        .execute(command, None, &db.context())
        .await
        .unwrap()
        .payment_id
}

#[tokio::test]
async fn test_open_account_persists_schedule_terms() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };

    let command =
        OpenAccountCommand::new("10000".to_string(), 12, PaymentFrequency::Monthly, start())
            .with_interest_rate(dec!(12));
    let result = OpenAccountHandler::new(db.pool.clone())
        .execute(command, &db.context())
        .await
        .unwrap();

    assert_eq!(result.schedule.len(), 12);
    assert_eq!(result.account.remaining_amount, dec!(10000));
    assert_eq!(result.account.next_due_date, Some(start()));

    let stored = AccountQueries::new(db.pool.clone())
        .account(result.account.id, &db.context())
        .await
        .unwrap();
    assert_eq!(stored.installment_amount, result.account.installment_amount);
    assert_eq!(stored.status, AccountStatus::Active);
}

#[tokio::test]
async fn test_sequential_payments_update_balance_and_due_date() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;

    pay(&db, account_id, "100", None).await;
    pay(&db, account_id, "100", None).await;

    let account = AccountQueries::new(db.pool.clone())
        .account(account_id, &db.context())
        .await
        .unwrap();
    assert_eq!(account.remaining_amount, dec!(1000));
    // Month-end start clamps to the last day of shorter months
    assert_eq!(account.next_due_date, NaiveDate::from_ymd_opt(2024, 3, 31));

    let payments = AccountQueries::new(db.pool.clone())
        .payments(account_id, &db.context())
        .await
        .unwrap();
    let numbers: Vec<_> = payments.iter().map(|p| p.installment_number).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn test_duplicate_installment_is_rejected() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    pay(&db, account_id, "100", Some(4)).await;

    let err = RecordPaymentHandler::new(db.pool.clone())
        .execute(
            RecordPaymentCommand::new(account_id, "100".to_string()).with_installment(4),
            None,
            &db.context(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Domain(DomainError::InstallmentAlreadyPaid { number: 4 })
    ));
}

#[tokio::test]
async fn test_reversal_writes_debit_credit_and_pending_rows() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    pay(&db, account_id, "100", None).await;
    let second = pay(&db, account_id, "100", None).await;

    let result = UndoPaymentHandler::new(db.pool.clone())
        .execute(UndoPaymentCommand::new(second), &db.context())
        .await
        .unwrap();
    assert_eq!(result.installment_number, 2);
    assert_eq!(result.remaining_amount, dec!(1100));

    let payments = AccountQueries::new(db.pool.clone())
        .payments(account_id, &db.context())
        .await
        .unwrap();
    let slot: Vec<_> = payments
        .iter()
        .filter(|p| p.installment_number == 2)
        .collect();
    assert_eq!(slot.len(), 3);

    let original = slot.iter().find(|p| p.id == second).unwrap();
    assert_eq!(original.state, PaymentState::Reversed);

    let mirror = slot
        .iter()
        .find(|p| p.id == result.compensating_payment_id)
        .unwrap();
    assert_eq!(mirror.state, PaymentState::CompensatingCredit);
    assert_eq!(mirror.amount_paid, dec!(100));

    let pending = slot
        .iter()
        .find(|p| p.id == result.pending_payment_id)
        .unwrap();
    assert_eq!(pending.state, PaymentState::Scheduled);

    // Installment 2 is re-payable and fills the placeholder in place
    let repaid = pay(&db, account_id, "100", Some(2)).await;
    assert_eq!(repaid, result.pending_payment_id);

    let account = AccountQueries::new(db.pool.clone())
        .account(account_id, &db.context())
        .await
        .unwrap();
    assert_eq!(account.remaining_amount, dec!(1000));
}

#[tokio::test]
async fn test_undo_failure_modes() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    let first = pay(&db, account_id, "100", None).await;
    let handler = UndoPaymentHandler::new(db.pool.clone());

    let reversal = handler
        .execute(UndoPaymentCommand::new(first), &db.context())
        .await
        .unwrap();

    let err = handler
        .execute(UndoPaymentCommand::new(first), &db.context())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::AlreadyAnnulled { .. })
    ));

    let err = handler
        .execute(
            UndoPaymentCommand::new(reversal.compensating_payment_id),
            &db.context(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::AlreadyAnnulled { .. })
    ));

    let err = handler
        .execute(
            UndoPaymentCommand::new(reversal.pending_payment_id),
            &db.context(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::PaymentPending { .. })
    ));

    let err = handler
        .execute(UndoPaymentCommand::new(Uuid::new_v4()), &db.context())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotFound(_)));
}

#[tokio::test]
async fn test_paid_off_account_reopens_on_reversal() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "300", 3).await;
    pay(&db, account_id, "100", None).await;
    pay(&db, account_id, "100", None).await;
    let last = pay(&db, account_id, "100", None).await;

    let queries = AccountQueries::new(db.pool.clone());
    let account = queries.account(account_id, &db.context()).await.unwrap();
    assert_eq!(account.status, AccountStatus::PaidOff);
    assert_eq!(account.remaining_amount, dec!(0));

    let err = RecordPaymentHandler::new(db.pool.clone())
        .execute(
            RecordPaymentCommand::new(account_id, "1".to_string()),
            None,
            &db.context(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::AccountPaidOff { .. })
    ));

    UndoPaymentHandler::new(db.pool.clone())
        .execute(UndoPaymentCommand::new(last), &db.context())
        .await
        .unwrap();

    let account = queries.account(account_id, &db.context()).await.unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.remaining_amount, dec!(100));
}

#[tokio::test]
async fn test_idempotent_payment_replays() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    let handler = RecordPaymentHandler::new(db.pool.clone());
    let key = Uuid::new_v4();
    let command = RecordPaymentCommand::new(account_id, "100".to_string())
        .with_payment_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

    let first = handler
        .execute(command.clone(), Some(key), &db.context())
        .await
        .unwrap();
    assert!(!first.replayed);

    let second = handler
        .execute(command, Some(key), &db.context())
        .await
        .unwrap();
    assert!(second.replayed);
    assert_eq!(second.payment_id, first.payment_id);

    let payments = AccountQueries::new(db.pool.clone())
        .payments(account_id, &db.context())
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);

    let err = handler
        .execute(
            RecordPaymentCommand::new(account_id, "200".to_string()),
            Some(key),
            &db.context(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IdempotencyConflict));
}

#[tokio::test]
async fn test_accounts_are_tenant_scoped() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    let stranger = OperationContext::new().with_organization(Uuid::new_v4());

    let err = AccountQueries::new(db.pool.clone())
        .account(account_id, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    let err = RecordPaymentHandler::new(db.pool.clone())
        .execute(
            RecordPaymentCommand::new(account_id, "100".to_string()),
            None,
            &stranger,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_concurrent_payments_take_distinct_installments() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    let context = db.context();

    let first = RecordPaymentHandler::new(db.pool.clone()).with_max_attempts(5);
    let second = RecordPaymentHandler::new(db.pool.clone()).with_max_attempts(5);

    let (a, b) = tokio::join!(
        first.execute(
            RecordPaymentCommand::new(account_id, "100".to_string()),
            None,
            &context,
        ),
        second.execute(
            RecordPaymentCommand::new(account_id, "100".to_string()),
            None,
            &context,
        ),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut numbers = vec![a.installment_number, b.installment_number];
    numbers.sort();
    assert_eq!(numbers, vec![1, 2]);

    let account = AccountQueries::new(db.pool.clone())
        .account(account_id, &context)
        .await
        .unwrap();
    assert_eq!(account.remaining_amount, dec!(1000));
    assert_eq!(
        a.remaining_amount.min(b.remaining_amount),
        account.remaining_amount
    );
}

#[tokio::test]
async fn test_expired_idempotency_key_is_reusable() {
    let Some(db) = common::setup_test_db().await else {
        return;
    };
    let account_id = open_interest_free(&db, "1200", 12).await;
    let key = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO idempotency_keys
            (organization_id, key, request_hash, processing_status, expires_at)
        VALUES ($1, $2, 'stale-hash', 'completed', NOW() - INTERVAL '1 hour')
        "#,
    )
    .bind(db.organization_id)
    .bind(key)
    .execute(&db.pool)
    .await
    .unwrap();

    let result = RecordPaymentHandler::new(db.pool.clone())
        .execute(
            RecordPaymentCommand::new(account_id, "100".to_string()),
            Some(key),
            &db.context(),
        )
        .await
        .unwrap();
    assert!(!result.replayed);
    assert_eq!(result.installment_number, 1);

    let removed = IdempotencyRepository::new()
        .cleanup_expired(&db.pool)
        .await
        .unwrap();
    let still_there: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM idempotency_keys WHERE organization_id = $1 AND key = $2)",
    )
    .bind(db.organization_id)
    .bind(key)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert!(still_there, "fresh claim must survive cleanup (removed {removed})");
}
