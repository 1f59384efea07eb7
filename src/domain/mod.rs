//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod frequency;
pub mod payment;

pub use account::{AccountStatus, AccountUpdate, CurrentAccount};
pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use error::DomainError;
pub use frequency::PaymentFrequency;
pub use payment::{Payment, PaymentState};
