//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CurrentAccount, OperationContext, Payment};
use crate::error::AppError;
use crate::handlers::{
    AccountQueries, OpenAccountCommand, OpenAccountHandler, OpenAccountResult,
    RecordPaymentCommand, RecordPaymentHandler, RecordPaymentResult, ScheduledInstallment,
    UndoPaymentCommand, UndoPaymentHandler, UndoPaymentResult,
};

/// Shared router state
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Attempts per serializable ledger transaction
    pub ledger_max_attempts: u32,
}

impl AppState {
    pub fn new(pool: PgPool, ledger_max_attempts: u32) -> Self {
        Self {
            pool,
            ledger_max_attempts,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

/// Success envelope: `{"success": true, "message": ..., ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount_paid: String,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub installment_number: Option<i32>,
    #[serde(default)]
    pub surplus_action: Option<String>,
}

impl RecordPaymentRequest {
    fn into_command(self, account_id: Uuid) -> RecordPaymentCommand {
        RecordPaymentCommand {
            account_id,
            amount_paid: self.amount_paid,
            payment_date: self.payment_date,
            payment_method: self.payment_method,
            transaction_reference: self.transaction_reference,
            notes: self.notes,
            installment_number: self.installment_number,
            surplus_action: self.surplus_action,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub message: String,
    pub account: CurrentAccount,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub message: String,
    pub account_id: Uuid,
    pub entries: Vec<ScheduledInstallment>,
}

#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    pub message: String,
    pub account_id: Uuid,
    pub payments: Vec<Payment>,
}

/// Optional Idempotency-Key header; a malformed key is rejected
fn idempotency_key(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    match headers.get("Idempotency-Key") {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| {
                AppError::InvalidRequest("Idempotency-Key must be a UUID".to_string())
            }),
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(open_account))
        .route("/accounts/:account_id", get(get_account))
        .route("/accounts/:account_id/schedule", get(get_schedule))
        .route(
            "/accounts/:account_id/payments",
            get(list_payments).post(record_payment),
        )
        .route("/payments/:payment_id/undo", post(undo_payment))
}

// =========================================================================
// POST /accounts
// =========================================================================

async fn open_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<OpenAccountCommand>,
) -> Result<(StatusCode, Json<ApiResponse<OpenAccountResult>>), AppError> {
    let handler = OpenAccountHandler::new(pool);
    let result = handler.execute(command, &context).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(result)))
}

// =========================================================================
// GET /accounts/:account_id
// =========================================================================

async fn get_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiResponse<AccountResponse>>, AppError> {
    let account = AccountQueries::new(pool).account(account_id, &context).await?;

    Ok(ApiResponse::ok(AccountResponse {
        message: "Account retrieved".to_string(),
        account,
    }))
}

// =========================================================================
// GET /accounts/:account_id/schedule
// =========================================================================

async fn get_schedule(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ScheduleResponse>>, AppError> {
    let entries = AccountQueries::new(pool).schedule(account_id, &context).await?;

    Ok(ApiResponse::ok(ScheduleResponse {
        message: format!("{} scheduled installments", entries.len()),
        account_id,
        entries,
    }))
}

// =========================================================================
// GET /accounts/:account_id/payments
// =========================================================================

async fn list_payments(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentsResponse>>, AppError> {
    let payments = AccountQueries::new(pool).payments(account_id, &context).await?;

    Ok(ApiResponse::ok(PaymentsResponse {
        message: format!("{} ledger rows", payments.len()),
        account_id,
        payments,
    }))
}

// =========================================================================
// POST /accounts/:account_id/payments
// =========================================================================

async fn record_payment(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RecordPaymentResult>>), AppError> {
    let idem_key = idempotency_key(&headers)?;

    let handler =
        RecordPaymentHandler::new(state.pool).with_max_attempts(state.ledger_max_attempts);
    let result = handler
        .execute(request.into_command(account_id), idem_key, &context)
        .await?;

    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, ApiResponse::ok(result)))
}

// =========================================================================
// POST /payments/:payment_id/undo
// =========================================================================

async fn undo_payment(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UndoPaymentResult>>, AppError> {
    let handler =
        UndoPaymentHandler::new(state.pool).with_max_attempts(state.ledger_max_attempts);
    let result = handler
        .execute(UndoPaymentCommand::new(payment_id), &context)
        .await?;

    Ok(ApiResponse::ok(result))
}
