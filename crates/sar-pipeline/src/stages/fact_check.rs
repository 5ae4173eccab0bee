use std::sync::Arc;

use async_trait::async_trait;
use sar_evidence::EvidenceStore;
use sar_types::{CaseId, NarrativeSection, Transaction};

use crate::collaborator::{Discrepancy, FactChecker};
use crate::error::PipelineResult;

/// Fact checker that re-reads every citation from the evidence store.
///
/// A citation passes when the transaction exists, the retrieved snapshot
/// still matches the store, no correction supersedes it, and the section
/// text carries the transaction's evidence reference verbatim (id, amount
/// and date).
pub struct EvidenceFactChecker {
    store: Arc<dyn EvidenceStore>,
}

impl EvidenceFactChecker {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FactChecker for EvidenceFactChecker {
    fn name(&self) -> &str {
        "evidence-fact-checker"
    }

    async fn verify(
        &self,
        case_id: &CaseId,
        sections: &[NarrativeSection],
        transactions: &[Transaction],
    ) -> PipelineResult<Vec<Discrepancy>> {
        let mut discrepancies = Vec::new();

        for section in sections {
            for cited in &section.citations {
                let flag = |reason: String| Discrepancy {
                    section_id: section.id.clone(),
                    transaction_id: cited.clone(),
                    reason,
                };

                let Some(stored) = self.store.transaction(case_id, cited).await? else {
                    discrepancies.push(flag("transaction not found in evidence store".into()));
                    continue;
                };
                if transactions.iter().any(|t| &t.id == cited && t != &stored) {
                    discrepancies.push(flag("evidence changed since retrieval".into()));
                    continue;
                }
                if let Some(correction) = self.store.correction_for(case_id, cited).await? {
                    discrepancies.push(flag(format!(
                        "transaction was superseded by correction {}",
                        correction.id
                    )));
                    continue;
                }

                let reference = stored.evidence_reference();
                if section.body.contains(&reference) {
                    continue;
                }
                if mentions(&section.body, cited.as_str()) {
                    discrepancies.push(flag(format!(
                        "amount or date does not match evidence, expected {reference}"
                    )));
                } else {
                    discrepancies.push(flag("citation is not mentioned in the section text".into()));
                }
            }
        }

        tracing::debug!(
            case = %case_id,
            sections = sections.len(),
            discrepancies = discrepancies.len(),
            "fact check finished"
        );
        Ok(discrepancies)
    }
}

/// Whether `text` mentions `id` as a whole token.
fn mentions(text: &str, id: &str) -> bool {
    text.match_indices(id).any(|(start, _)| {
        let end = start + id.len();
        let boundary = |c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_');
        text[..start].chars().next_back().map_or(true, boundary)
            && text[end..].chars().next().map_or(true, boundary)
    })
}
