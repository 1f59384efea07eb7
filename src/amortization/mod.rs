//! Amortization module
//!
//! Pure schedule arithmetic: effective periodic rates, the annuity formula
//! and the full amortization table. No I/O.

mod rate;
mod schedule;

pub use rate::{fixed_installment, periodic_rate};
pub use schedule::{AmortizationSchedule, ScheduleEntry};
