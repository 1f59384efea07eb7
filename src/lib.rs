//! installment_ledger Library
//!
//! Installment ledger and amortization engine for financed-sale current
//! accounts. Re-exports modules for the server binary and integration tests.

pub mod amortization;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod handlers;
pub mod idempotency;
pub mod ledger;

mod error;

pub use config::Config;
pub use domain::{Amount, AmountError, DomainError, OperationContext};
pub use error::{AppError, AppResult, ErrorKind};
