use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::TransactionId;
use crate::money::Money;

/// Payment instrument of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Wire,
    #[serde(rename = "ACH")]
    Ach,
    Cash,
    Crypto,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wire => "Wire",
            Self::Ach => "ACH",
            Self::Cash => "Cash",
            Self::Crypto => "Crypto",
        };
        f.write_str(s)
    }
}

/// Flow direction relative to the customer's account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A single piece of transaction evidence.
///
/// Transactions are immutable once ingested into a case. A correction is a
/// new transaction whose `supersedes` field names the one it corrects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub amount: Money,
    pub counterparty: String,
    pub instrument: Instrument,
    pub direction: Direction,
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<TransactionId>,
}

impl Transaction {
    /// Calendar date of the transaction (UTC).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Inbound cash deposit (the structuring instrument).
    pub fn is_cash_deposit(&self) -> bool {
        self.instrument == Instrument::Cash && self.direction == Direction::Inbound
    }

    /// Outbound wire or crypto transfer.
    pub fn is_outbound_transfer(&self) -> bool {
        self.direction == Direction::Outbound
            && matches!(self.instrument, Instrument::Wire | Instrument::Crypto)
    }

    /// The canonical evidence reference used in narrative text:
    /// `TRX-8921 (USD 9,800.00 on 2023-10-12)`.
    pub fn evidence_reference(&self) -> String {
        format!("{} ({} on {})", self.id, self.amount, self.date())
    }
}

/// The transactions of `transactions` that no correction in the same set
/// supersedes, in their original order.
pub fn in_force(transactions: &[Transaction]) -> impl Iterator<Item = &Transaction> + '_ {
    let superseded: HashSet<&TransactionId> = transactions
        .iter()
        .filter_map(|t| t.supersedes.as_ref())
        .collect();
    transactions.iter().filter(move |t| !superseded.contains(&t.id))
}
