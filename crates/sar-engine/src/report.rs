use chrono::{DateTime, NaiveDate, Utc};
use sar_types::{Case, CaseId, CustomerId, Money, RiskLevel, Transaction, TransactionId, Typology};
use serde::{Deserialize, Serialize};

/// A Suspicious Activity Report assembled from a case's narrative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SarReport {
    pub case_id: CaseId,
    pub generated_at: DateTime<Utc>,
    pub filing_institution: String,
    pub subject_information: SubjectInformation,
    pub suspicious_activity_information: SuspiciousActivityInformation,
    pub narrative: Vec<ReportSection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInformation {
    pub name: String,
    pub id: CustomerId,
    pub risk_score: u8,
    pub risk_rating: RiskLevel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousActivityInformation {
    /// Name of the highest-confidence typology.
    pub category: Option<String>,
    pub typologies: Vec<String>,
    /// Total of flagged, non-superseded transactions.
    pub cumulative_amount: Money,
    pub flagged_transactions: usize,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
    pub supporting_evidence: Vec<TransactionId>,
}

impl SarReport {
    /// Assemble the report. Returns `None` when the case has no narrative.
    pub fn assemble(case: &Case, filing_institution: &str) -> Option<Self> {
        let narrative = case.narrative.as_ref()?;

        // A corrected transaction counts once, through its correction.
        let flagged: Vec<&Transaction> = case.flagged_transactions().collect();

        let currency = flagged
            .first()
            .map(|t| t.amount.currency.clone())
            .unwrap_or_else(|| "USD".into());
        let total = flagged
            .iter()
            .filter(|t| t.amount.currency == currency)
            .map(|t| t.amount.magnitude())
            .sum::<u64>();

        let primary = case
            .typologies
            .iter()
            .fold(None, |best: Option<&Typology>, t| match best {
                Some(b) if b.confidence >= t.confidence => Some(b),
                _ => Some(t),
            });

        Some(Self {
            case_id: case.id.clone(),
            generated_at: Utc::now(),
            filing_institution: filing_institution.to_string(),
            subject_information: SubjectInformation {
                name: case.customer.name.clone(),
                id: case.customer.id.clone(),
                risk_score: case.risk_score,
                risk_rating: case.risk_level(),
            },
            suspicious_activity_information: SuspiciousActivityInformation {
                category: primary.map(|t| t.name.clone()),
                typologies: case.typologies.iter().map(|t| t.name.clone()).collect(),
                cumulative_amount: Money::new(i64::try_from(total).unwrap_or(i64::MAX), currency),
                flagged_transactions: flagged.len(),
                date_range_start: flagged.iter().map(|t| t.date()).min(),
                date_range_end: flagged.iter().map(|t| t.date()).max(),
            },
            narrative: narrative
                .sections
                .iter()
                .map(|s| ReportSection {
                    title: s.title.clone(),
                    content: s.body.clone(),
                    supporting_evidence: s.citations.clone(),
                })
                .collect(),
        })
    }
}
