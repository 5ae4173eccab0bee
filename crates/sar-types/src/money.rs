use std::fmt;

use serde::{Deserialize, Serialize};

/// A signed amount in minor units (cents) with an ISO currency code.
///
/// Amounts are kept as integers so that sums and threshold comparisons are
/// exact; floating point never touches evidence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units. Negative values are debits.
    pub minor_units: i64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl Money {
    pub fn new(minor_units: i64, currency: impl Into<String>) -> Self {
        Self {
            minor_units,
            currency: currency.into(),
        }
    }

    /// Build from whole major units (e.g. dollars).
    pub fn from_major(major: i64, currency: impl Into<String>) -> Self {
        Self::new(major * 100, currency)
    }

    /// Absolute value in minor units.
    pub fn magnitude(&self) -> u64 {
        self.minor_units.unsigned_abs()
    }

    /// The amount without currency, grouped in thousands: `-19,300.00`.
    pub fn format_amount(&self) -> String {
        let magnitude = self.magnitude();
        let major = (magnitude / 100).to_string();
        let minor = magnitude % 100;

        let mut grouped = String::with_capacity(major.len() + major.len() / 3);
        for (i, ch) in major.chars().enumerate() {
            if i > 0 && (major.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let sign = if self.minor_units < 0 { "-" } else { "" };
        format!("{sign}{grouped}.{minor:02}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.format_amount())
    }
}
