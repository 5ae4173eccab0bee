use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{CaseId, CustomerId, TransactionId};
use crate::narrative::Narrative;
use crate::transaction::{in_force, Transaction};
use crate::typology::Typology;

/// Risk banding of a 0–100 score.
///
/// The thresholds are policy constants: `High` at 80 and above, `Medium`
/// from 50 to 79, `Low` below 50. Every component derives the level from the
/// score through [`RiskLevel::from_score`] and never stores it separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const HIGH_THRESHOLD: u8 = 80;
    pub const MEDIUM_THRESHOLD: u8 = 50;

    pub fn from_score(score: u8) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// Position of a case in the investigation and filing workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    Open,
    #[serde(rename = "In Review")]
    InReview,
    Drafting,
    #[serde(rename = "QA Pending")]
    QaPending,
    Escalated,
    #[serde(rename = "Ready for Filing")]
    ReadyForFiling,
    Filed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 7] = [
        Self::Open,
        Self::InReview,
        Self::Drafting,
        Self::QaPending,
        Self::Escalated,
        Self::ReadyForFiling,
        Self::Filed,
    ];

    /// Locked statuses freeze the narrative and refuse pipeline progress.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Escalated | Self::ReadyForFiling)
    }

    /// `Filed` admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filed)
    }

    /// Rank along the investigation track (`Open` < `In Review` < `Drafting`
    /// < `QA Pending`). Locked and terminal statuses are off the track.
    pub fn progress_rank(&self) -> Option<u8> {
        match self {
            Self::Open => Some(0),
            Self::InReview => Some(1),
            Self::Drafting => Some(2),
            Self::QaPending => Some(3),
            Self::Escalated | Self::ReadyForFiling | Self::Filed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InReview => "In Review",
            Self::Drafting => "Drafting",
            Self::QaPending => "QA Pending",
            Self::Escalated => "Escalated",
            Self::ReadyForFiling => "Ready for Filing",
            Self::Filed => "Filed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TypeError::UnknownStatus(s.to_string()))
    }
}

/// The customer a case is opened against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
}

/// An investigation case: the engine's read model.
///
/// Owned by the case state machine; callers receive clones and can only
/// change a case through engine commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub customer: Customer,
    pub opened_on: NaiveDate,
    pub risk_score: u8,
    pub status: CaseStatus,
    pub assignee: Option<String>,
    pub transactions: Vec<Transaction>,
    pub typologies: Vec<Typology>,
    pub narrative: Option<Narrative>,
}

impl Case {
    /// Derived from `risk_score`; never stored.
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.id == id)
    }

    pub fn has_transaction(&self, id: &TransactionId) -> bool {
        self.transaction(id).is_some()
    }

    /// Flagged transactions still in force; a corrected transaction is
    /// represented by its correction.
    pub fn flagged_transactions(&self) -> impl Iterator<Item = &Transaction> {
        in_force(&self.transactions).filter(|t| t.flagged)
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            id: self.id.clone(),
            customer_name: self.customer.name.clone(),
            customer_id: self.customer.id.clone(),
            opened_on: self.opened_on,
            risk_score: self.risk_score,
            risk_level: self.risk_level(),
            status: self.status,
            assignee: self.assignee.clone(),
        }
    }
}

/// Listing view of a case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: CaseId,
    pub customer_name: String,
    pub customer_id: CustomerId,
    pub opened_on: NaiveDate,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub status: CaseStatus,
    pub assignee: Option<String>,
}
