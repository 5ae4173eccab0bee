//! The SAR-2023-001 investigation used by the demo and the tests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sar_types::{Customer, Direction, Instrument, Money, Transaction, Typology};

use crate::engine::NewCase;

pub const SAMPLE_CASE_ID: &str = "SAR-2023-001";

/// Case SAR-2023-001 against Aries Import/Export Ltd.: six transactions,
/// with structuring and rapid movement already flagged by monitoring.
pub fn sample_case() -> NewCase {
    NewCase {
        id: Some(SAMPLE_CASE_ID.into()),
        customer: Customer {
            id: "CUST-8821".into(),
            name: "Aries Import/Export Ltd.".into(),
        },
        opened_on: NaiveDate::from_ymd_opt(2023, 10, 22),
        risk_score: 92,
        transactions: sample_transactions(),
        typologies: sample_typologies(),
    }
}

/// The same case without seeded typologies, so detection runs from scratch.
pub fn sample_case_undetected() -> NewCase {
    NewCase {
        typologies: Vec::new(),
        ..sample_case()
    }
}

pub fn sample_transactions() -> Vec<Transaction> {
    use Direction::*;
    use Instrument::*;
    vec![
        tx("TRX-8921", 12, 9_800, "Cash Deposit", Cash, Inbound, true, Some("Branch deposit, just under threshold")),
        tx("TRX-8922", 13, 9_500, "Cash Deposit", Cash, Inbound, true, Some("Branch deposit at different location")),
        tx("TRX-8925", 15, 19_300, "Shell Corp LLC", Wire, Outbound, true, Some("Immediate transfer after aggregation")),
        tx("TRX-8940", 18, 500, "Coffee Shop", Ach, Outbound, false, None),
        tx("TRX-8941", 18, 9_900, "Cash Deposit", Cash, Inbound, true, Some("Structured deposit")),
        tx("TRX-8955", 20, 9_900, "CryptoExchange Inc", Wire, Outbound, true, Some("High risk counterparty")),
    ]
}

pub fn sample_typologies() -> Vec<Typology> {
    vec![
        Typology {
            id: "TYP-01".into(),
            name: "Structuring / Smurfing".into(),
            description: "Multiple cash deposits just under the $10,000 reporting threshold.".into(),
            confidence: 0.98,
            related_transactions: vec!["TRX-8921".into(), "TRX-8922".into(), "TRX-8941".into()],
            rationale: vec![
                "Multiple cash deposits between $9,500 and $9,900 were identified across consecutive days.".into(),
                "The aggregate cash volume of $29,200 within a 7-day period is inconsistent with the customer's historical monthly average of $4,500.".into(),
                "Deposit activity occurred at multiple distinct branch locations, which may indicate an attempt to avoid localized detection.".into(),
            ],
        },
        Typology {
            id: "TYP-02".into(),
            name: "Rapid Movement of Funds".into(),
            description: "Funds are transferred out almost immediately after being deposited.".into(),
            confidence: 0.85,
            related_transactions: vec!["TRX-8925".into(), "TRX-8955".into()],
            rationale: vec![
                "Inbound cash deposits were depleted via outgoing wire transfers within 24 hours of posting.".into(),
                "Zero or near-zero end-of-day balances were maintained despite significant throughput.".into(),
                "Transfers were directed to high-risk counterparty types (Crypto Exchange, Shell Company) lacking apparent commercial purpose for a Logistics entity.".into(),
            ],
        },
    ]
}

/// 2023-10-01T10:00:00Z as seconds since the epoch.
const OCTOBER_FIRST_2023: i64 = 1_696_154_400;

/// 10:00 UTC on the given day of October 2023.
fn october_2023(day: u32) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
        + Duration::seconds(OCTOBER_FIRST_2023)
        + Duration::days(i64::from(day) - 1)
}

#[allow(clippy::too_many_arguments)]
fn tx(
    id: &str,
    day: u32,
    dollars: i64,
    counterparty: &str,
    instrument: Instrument,
    direction: Direction,
    flagged: bool,
    description: Option<&str>,
) -> Transaction {
    Transaction {
        id: id.into(),
        timestamp: october_2023(day),
        amount: Money::from_major(dollars, "USD"),
        counterparty: counterparty.into(),
        instrument,
        direction,
        flagged,
        description: description.map(str::to_string),
        supersedes: None,
    }
}
