//! Ledger module
//!
//! Installment numbering, payment splitting, payment recording and reversal
//! over an account's ledger, plus the PostgreSQL repository that persists
//! the resulting postings.

mod book;
mod error;
mod numbering;
mod opening;
mod repository;
mod splitter;

pub use book::{LedgerBook, PaymentPosting, PaymentRequest, ReversalPosting};
pub use error::LedgerStoreError;
pub use numbering::{effective_count, resolve_installment, InstallmentSlot};
pub use opening::{open_account, AccountTerms};
pub use repository::{LedgerRepository, PaymentLookup};
pub use splitter::{original_plan, split_payment, PaymentSplit, SurplusAction, SURPLUS_TOLERANCE};
