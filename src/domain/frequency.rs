//! Payment frequency and due-date arithmetic.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often an installment falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annually,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "WEEKLY",
            PaymentFrequency::Biweekly => "BIWEEKLY",
            PaymentFrequency::Monthly => "MONTHLY",
            PaymentFrequency::Quarterly => "QUARTERLY",
            PaymentFrequency::Annually => "ANNUALLY",
        }
    }

    /// Number of periods in one year.
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::Biweekly => 26,
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::Annually => 1,
        }
    }

    /// Parse a stored frequency code, defaulting to `Monthly` for unknown codes.
    pub fn parse_lenient(code: &str) -> Self {
        code.parse().unwrap_or_else(|_| {
            tracing::warn!(
                frequency = code,
                "Unknown payment frequency, defaulting to MONTHLY"
            );
            PaymentFrequency::Monthly
        })
    }

    /// Due date of the installment at zero-based `installment_index`.
    ///
    /// Returns `None` once the schedule is exhausted
    /// (`installment_index >= number_of_installments`). Month-based
    /// frequencies use calendar arithmetic, so Jan 31 + 1 month is the last
    /// day of February.
    pub fn due_date(
        &self,
        anchor: NaiveDate,
        installment_index: i32,
        number_of_installments: i32,
    ) -> Option<NaiveDate> {
        if installment_index < 0 || installment_index >= number_of_installments {
            return None;
        }
        let index = installment_index as u32;

        match self {
            PaymentFrequency::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(index))),
            PaymentFrequency::Biweekly => {
                anchor.checked_add_days(Days::new(14 * u64::from(index)))
            }
            PaymentFrequency::Monthly => anchor.checked_add_months(Months::new(index)),
            PaymentFrequency::Quarterly => anchor.checked_add_months(Months::new(3 * index)),
            PaymentFrequency::Annually => anchor.checked_add_months(Months::new(12 * index)),
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized frequency code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown payment frequency: {0}")]
pub struct UnknownFrequency(pub String);

impl FromStr for PaymentFrequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(PaymentFrequency::Weekly),
            "BIWEEKLY" => Ok(PaymentFrequency::Biweekly),
            "MONTHLY" => Ok(PaymentFrequency::Monthly),
            "QUARTERLY" => Ok(PaymentFrequency::Quarterly),
            "ANNUALLY" => Ok(PaymentFrequency::Annually),
            _ => Err(UnknownFrequency(s.to_string())),
        }
    }
}
