//! Command Handlers module
//!
//! Handlers that orchestrate ledger operations: validate the command, run the
//! pure ledger computation inside a serializable transaction, and persist the
//! result.

mod account_queries;
mod commands;
mod open_account_handler;
mod record_payment_handler;
mod undo_payment_handler;


use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

pub use account_queries::{annotated_schedule, AccountQueries, ScheduledInstallment};
pub use commands::*;
pub use open_account_handler::OpenAccountHandler;
pub use record_payment_handler::RecordPaymentHandler;
pub use undo_payment_handler::UndoPaymentHandler;

/// Attempts per ledger transaction unless configured otherwise
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Run a transaction attempt, retrying serialization conflicts with linear
/// backoff.
pub(crate) async fn retry_serializable<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt_fn: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match attempt_fn().await {
            Err(AppError::ConcurrentModification) if attempt < max_attempts => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    "Serialization conflict, retrying"
                );
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
            result => return result,
        }
    }

    Err(AppError::ConcurrentModification)
}
