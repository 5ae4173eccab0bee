use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use sar_evidence::EvidenceStore;
use sar_index::CrossReferenceIndex;
use sar_types::{CaseId, NarrativeSection, Transaction, Typology};

use crate::collaborator::{Discrepancy, DraftContext, FactChecker, NarrativeGenerator, TypologyDetector};
use crate::config::{DetectionConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::stage::PipelineStage;
use crate::stages::{EvidenceFactChecker, RuleBasedDetector, TemplateGenerator};

/// A validated draft: the sections plus the index proving every citation
/// resolves.
#[derive(Clone, Debug)]
pub struct Draft {
    pub sections: Vec<NarrativeSection>,
    pub index: CrossReferenceIndex,
}

/// Runs the delegating work of each pipeline stage.
///
/// `NarrativePipeline` is stateless with respect to cases: it performs one
/// stage's delegation under that stage's timeout and validates the result.
/// Stage bookkeeping lives in [`StageTracker`](crate::StageTracker), which
/// the caller holds under its own lock. Nothing here is held across calls,
/// so a caller can drop its lock while a delegation is outstanding.
pub struct NarrativePipeline {
    evidence: Arc<dyn EvidenceStore>,
    detector: Arc<dyn TypologyDetector>,
    generator: Arc<dyn NarrativeGenerator>,
    fact_checker: Arc<dyn FactChecker>,
    config: PipelineConfig,
}

impl NarrativePipeline {
    pub fn new(
        evidence: Arc<dyn EvidenceStore>,
        detector: Arc<dyn TypologyDetector>,
        generator: Arc<dyn NarrativeGenerator>,
        fact_checker: Arc<dyn FactChecker>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            evidence,
            detector,
            generator,
            fact_checker,
            config,
        }
    }

    /// Pipeline wired to the built-in collaborators.
    pub fn with_builtin(
        evidence: Arc<dyn EvidenceStore>,
        config: PipelineConfig,
        detection: DetectionConfig,
    ) -> Self {
        let fact_checker = Arc::new(EvidenceFactChecker::new(Arc::clone(&evidence)));
        Self::new(
            evidence,
            Arc::new(RuleBasedDetector::new(detection)),
            Arc::new(TemplateGenerator::new()),
            fact_checker,
            config,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn evidence(&self) -> &Arc<dyn EvidenceStore> {
        &self.evidence
    }

    // ---------------------------------------------------------------
    // Stage work
    // ---------------------------------------------------------------

    /// `retrieving`: read the case's transactions from the evidence store.
    pub async fn retrieve(&self, case_id: &CaseId) -> PipelineResult<Vec<Transaction>> {
        self.delegate(PipelineStage::Retrieving, "evidence-store", async {
            Ok(self.evidence.transactions(case_id).await?)
        })
        .await
    }

    /// `analyzing`: run typology detection and check what comes back.
    pub async fn analyze(&self, transactions: &[Transaction]) -> PipelineResult<Vec<Typology>> {
        let detected = self
            .delegate(
                PipelineStage::Analyzing,
                self.detector.name(),
                self.detector.detect(transactions),
            )
            .await?;

        for typology in &detected {
            typology.validate().map_err(|e| PipelineError::InvalidTypology {
                typology: typology.id.clone(),
                reason: e.to_string(),
            })?;
        }
        // Related transactions must resolve; ids must be unique.
        CrossReferenceIndex::build(transactions, &detected, &[])?;
        Ok(detected)
    }

    /// `drafting`: generate sections and check every citation.
    pub async fn draft(
        &self,
        context: &DraftContext,
        transactions: &[Transaction],
        typologies: &[Typology],
    ) -> PipelineResult<Draft> {
        let sections = self
            .delegate(
                PipelineStage::Drafting,
                self.generator.name(),
                self.generator.draft(context, transactions, typologies),
            )
            .await?;
        if sections.is_empty() {
            return Err(PipelineError::collaborator(
                PipelineStage::Drafting,
                self.generator.name(),
                "generator returned no sections",
            ));
        }

        let index = CrossReferenceIndex::build(transactions, typologies, &sections)?;
        Ok(Draft { sections, index })
    }

    /// `fact_checking`: verify every citation. An empty result means the
    /// narrative holds up.
    pub async fn fact_check(
        &self,
        case_id: &CaseId,
        sections: &[NarrativeSection],
        transactions: &[Transaction],
    ) -> PipelineResult<Vec<Discrepancy>> {
        self.delegate(
            PipelineStage::FactChecking,
            self.fact_checker.name(),
            self.fact_checker.verify(case_id, sections, transactions),
        )
        .await
    }

    /// Run one delegation under its stage's timeout.
    async fn delegate<T, F>(&self, stage: PipelineStage, collaborator: &str, work: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        let started = Instant::now();
        let result = match self.config.timeout_for(stage) {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(%stage, collaborator, after = ?limit, "stage delegation timed out");
                    return Err(PipelineError::StageTimeout { stage, after: limit });
                }
            },
            None => work.await,
        };
        tracing::debug!(
            %stage,
            collaborator,
            elapsed = ?started.elapsed(),
            ok = result.is_ok(),
            "stage delegation returned"
        );
        result
    }
}

impl std::fmt::Debug for NarrativePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativePipeline")
            .field("detector", &self.detector.name())
            .field("generator", &self.generator.name())
            .field("fact_checker", &self.fact_checker.name())
            .field("config", &self.config)
            .finish()
    }
}
