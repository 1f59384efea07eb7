//! Installment numbering.
//!
//! Decides which installment a new payment fills.

use uuid::Uuid;

use crate::domain::{CurrentAccount, DomainError, Payment, PaymentState};

/// Installment a new payment will occupy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentSlot {
    pub number: i32,
    /// Pending placeholder left by a reversal for this installment, if any
    pub pending_placeholder: Option<Uuid>,
}

/// Rows with a null version code: paid installments plus pending placeholders.
pub fn effective_count(payments: &[Payment]) -> i32 {
    let count = payments
        .iter()
        .filter(|p| p.state.counts_as_installment())
        .count();
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Resolve the installment for a new payment.
///
/// An explicit number must lie in `1..=number_of_installments`; without one,
/// the next number is `effective_count + 1`. Either way the installment must
/// not already hold a paid entry.
pub fn resolve_installment(
    account: &CurrentAccount,
    payments: &[Payment],
    requested: Option<i32>,
) -> Result<InstallmentSlot, DomainError> {
    let max = account.number_of_installments;

    let number = match requested {
        Some(number) if number < 1 || number > max => {
            return Err(DomainError::InvalidInstallment { number, max });
        }
        Some(number) => number,
        None => {
            let next = effective_count(payments).saturating_add(1);
            if next > max {
                return Err(DomainError::ScheduleExhausted {
                    number_of_installments: max,
                });
            }
            next
        }
    };

    let in_slot = |state: PaymentState| {
        payments
            .iter()
            .find(move |p| p.installment_number == number && p.state == state)
    };

    if in_slot(PaymentState::Paid).is_some() {
        return Err(DomainError::InstallmentAlreadyPaid { number });
    }

    Ok(InstallmentSlot {
        number,
        pending_placeholder: in_slot(PaymentState::Scheduled).map(|p| p.id),
    })
}
