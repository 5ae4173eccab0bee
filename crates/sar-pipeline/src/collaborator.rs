use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sar_types::{CaseId, Customer, NarrativeSection, SectionId, Transaction, TransactionId, Typology};

use crate::error::PipelineResult;

// ---------------------------------------------------------------------------
// Typology detection
// ---------------------------------------------------------------------------

/// Detects suspicious-activity patterns in a case's transactions.
///
/// The pipeline records what the detector returns; it does not second-guess
/// the detection beyond checking confidences and transaction references.
#[async_trait]
pub trait TypologyDetector: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, transactions: &[Transaction]) -> PipelineResult<Vec<Typology>>;
}

// ---------------------------------------------------------------------------
// Narrative generation
// ---------------------------------------------------------------------------

/// Case facts a generator may mention besides the evidence itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftContext {
    pub case_id: CaseId,
    pub customer: Customer,
}

/// Turns evidence and typologies into ordered narrative sections.
///
/// Every citation a generator emits is checked against the transaction set
/// before the narrative is accepted.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn draft(
        &self,
        context: &DraftContext,
        transactions: &[Transaction],
        typologies: &[Typology],
    ) -> PipelineResult<Vec<NarrativeSection>>;
}

// ---------------------------------------------------------------------------
// Fact checking
// ---------------------------------------------------------------------------

/// A citation that does not hold up against the evidence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub section_id: SectionId,
    pub transaction_id: TransactionId,
    pub reason: String,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.section_id, self.transaction_id, self.reason)
    }
}

/// Re-checks every cited amount and date against the evidence.
///
/// An empty result means the narrative verified.
#[async_trait]
pub trait FactChecker: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(
        &self,
        case_id: &CaseId,
        sections: &[NarrativeSection],
        transactions: &[Transaction],
    ) -> PipelineResult<Vec<Discrepancy>>;
}
