//! Idempotency module
//!
//! Prevents duplicate payment postings using idempotency keys.

mod repository;

pub use repository::{IdempotencyClaim, IdempotencyError, IdempotencyRepository, IdempotencyStatus};
