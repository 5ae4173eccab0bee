use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Datelike, NaiveDate, Utc};
use sar_audit::{AuditAction, AuditEvent, AuditReader, AuditWriter, InMemoryAuditLog};
use sar_evidence::{EvidenceStore, InMemoryEvidenceStore};
use sar_index::{CrossReferenceIndex, IndexError};
use sar_pipeline::{
    Draft, DraftContext, NarrativePipeline, PipelineStage, PipelineStatus, RunTicket,
};
use sar_types::{
    Actor, Case, CaseId, CaseStatus, CaseSummary, Customer, Narrative, SectionId, Transaction,
    TransactionId, Typology, TypologyId,
};
use serde::Deserialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::machine;
use crate::metrics::DashboardMetrics;
use crate::record::{CaseRecord, CaseSlot};
use crate::report::SarReport;

/// Input to [`CaseEngine::create_case`].
#[derive(Clone, Debug, Deserialize)]
pub struct NewCase {
    /// Caller-chosen id; generated as `<prefix>-<year>-<seq>` when absent.
    #[serde(default)]
    pub id: Option<CaseId>,
    pub customer: Customer,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub opened_on: Option<NaiveDate>,
    pub risk_score: u8,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub typologies: Vec<Typology>,
}

/// The case investigation workflow engine.
///
/// Owns every case's status, pipeline stage, narrative and audit log, and
/// exposes them only through commands and queries. Commands against one
/// case are serialized by that case's lock; different cases never contend.
///
/// Pipeline delegations run with the case lock released, so queries and
/// `escalate` stay responsive while a stage is outstanding. Each run holds a
/// ticket from the case's stage tracker; a run whose ticket was invalidated
/// (by escalation) has its result discarded when it comes back.
pub struct CaseEngine {
    config: EngineConfig,
    pipeline: NarrativePipeline,
    cases: RwLock<BTreeMap<CaseId, Arc<CaseSlot>>>,
    creation: Mutex<()>,
    next_ordinal: AtomicU64,
    next_sequence: AtomicU64,
}

impl CaseEngine {
    /// Engine backed by an in-memory evidence store and the built-in
    /// collaborators.
    pub fn new(config: EngineConfig) -> Self {
        let evidence: Arc<dyn EvidenceStore> = Arc::new(InMemoryEvidenceStore::new());
        let pipeline = NarrativePipeline::with_builtin(
            evidence,
            config.pipeline.clone(),
            config.detection.clone(),
        );
        Self::with_pipeline(config, pipeline)
    }

    /// Engine driving a custom pipeline. Evidence is ingested into the
    /// pipeline's own store and its timeouts take precedence over
    /// `config.pipeline`.
    pub fn with_pipeline(config: EngineConfig, pipeline: NarrativePipeline) -> Self {
        Self {
            config,
            pipeline,
            cases: RwLock::new(BTreeMap::new()),
            creation: Mutex::new(()),
            next_ordinal: AtomicU64::new(0),
            next_sequence: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn evidence(&self) -> &Arc<dyn EvidenceStore> {
        self.pipeline.evidence()
    }

    // ---------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------

    /// Open a case in `Open` status and ingest its evidence.
    pub async fn create_case(&self, new: NewCase) -> EngineResult<Case> {
        let NewCase {
            id,
            customer,
            opened_on,
            risk_score,
            transactions,
            typologies,
        } = new;

        let index = validate_new_case(&customer, risk_score, &transactions, &typologies)
            .inspect_err(|err| warn!(error = %err, "case creation rejected"))?;
        let opened_on = opened_on.unwrap_or_else(|| Utc::now().date_naive());

        let _creating = self.creation.lock().await;
        let id = match id {
            Some(id) => CaseId::new(id.as_str()).map_err(|e| EngineError::InvalidInput(e.to_string()))?,
            None => self.next_case_id(opened_on)?,
        };
        let registered = self.read_cases()?.contains_key(&id);
        if registered || self.evidence().contains_case(&id).await? {
            return Err(EngineError::CaseExists(id));
        }

        let flagged = transactions.iter().filter(|t| t.flagged).count();
        let ingested = self.evidence().ingest(&id, transactions.clone()).await?;

        let audit = InMemoryAuditLog::new(id.clone());
        audit.append(
            &Actor::System,
            AuditAction::CaseCreated,
            &format!(
                "Case opened against {} ({}) with risk score {} ({}).",
                customer.name,
                customer.id,
                risk_score,
                sar_types::RiskLevel::from_score(risk_score)
            ),
        )?;
        if ingested > 0 {
            audit.append(
                &Actor::System,
                AuditAction::DataIngestion,
                &format!("Ingested {ingested} transactions ({flagged} flagged)."),
            )?;
        }
        if !typologies.is_empty() {
            audit.append(
                &Actor::System,
                AuditAction::TypologyScan,
                &format!("Detected {}.", describe_typologies(&typologies)),
            )?;
        }

        let case = Case {
            id: id.clone(),
            customer,
            opened_on,
            risk_score,
            status: CaseStatus::Open,
            assignee: None,
            transactions,
            typologies,
            narrative: None,
        };
        let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
        let slot = CaseSlot::new(CaseRecord::new(case.clone(), index), audit, ordinal);
        self.write_cases()?.insert(id, Arc::new(slot));

        info!(
            case = %case.id,
            transactions = case.transactions.len(),
            typologies = case.typologies.len(),
            "case created"
        );
        Ok(case)
    }

    /// Assign an unassigned case to a named user.
    pub async fn assign(&self, case_id: &CaseId, actor: &Actor) -> EngineResult<Case> {
        let Actor::User(name) = actor else {
            return Err(EngineError::InvalidInput(
                "a case can only be assigned to a named user".into(),
            ));
        };
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;

        if let Some(current) = &record.case.assignee {
            return Err(EngineError::guard(format!(
                "case is already assigned to {current}"
            )));
        }
        self.record(&slot, actor, AuditAction::CaseAssignment, &format!("Case assigned to {name}."))?;
        record.case.assignee = Some(name.clone());

        info!(case = %case_id, assignee = %name, "case assigned");
        Ok(record.case.clone())
    }

    /// Run narrative generation through `retrieving`, `analyzing` and
    /// `drafting` to `complete`, or resume a run that stalled on a failed
    /// or timed-out stage.
    pub async fn start_narrative(&self, case_id: &CaseId) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let (ticket, mut stage) = {
            let mut record = slot.record.lock().await;
            machine::ensure_unlocked(record.case.status)?;

            let mut tracker = record.tracker.clone();
            let start = tracker.start_generation()?;
            match start.entered {
                Some(entered) => {
                    self.enter_stage(&slot, &mut record, entered, "Narrative generation started")?
                }
                None => info!(case = %case_id, stage = %tracker.stage(), "resuming stalled narrative run"),
            }
            record.tracker = tracker;
            (start.ticket, record.tracker.stage())
        };

        loop {
            stage = match stage {
                PipelineStage::Retrieving => self.retrieve_step(&slot, &ticket).await?,
                PipelineStage::Analyzing => self.analyze_step(&slot, &ticket).await?,
                PipelineStage::Drafting => self.draft_step(&slot, &ticket).await?,
                _ => break,
            };
        }

        let record = slot.record.lock().await;
        info!(case = %case_id, status = %record.case.status, "narrative generation complete");
        Ok(record.case.clone())
    }

    /// Fact-check a `complete` narrative. Succeeds with the pipeline at
    /// `verified`; on any discrepancy the pipeline falls back to `complete`
    /// and the discrepancies are returned as the error.
    pub async fn run_fact_check(&self, case_id: &CaseId) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let (ticket, sections, transactions) = {
            let mut record = slot.record.lock().await;
            machine::ensure_unlocked(record.case.status)?;

            let mut tracker = record.tracker.clone();
            let start = tracker.start_fact_check()?;
            if let Some(entered) = start.entered {
                let summary = format!("Fact check of {} citations started", citation_count(&record.case));
                self.enter_stage(&slot, &mut record, entered, &summary)?;
            }
            record.tracker = tracker;
            (start.ticket, record.sections().to_vec(), record.case.transactions.clone())
        };

        let stage = PipelineStage::FactChecking;
        let result = self.pipeline.fact_check(case_id, &sections, &transactions).await;
        let mut record = self.reacquire(&slot, &ticket, stage).await?;

        let discrepancies = match result {
            Ok(discrepancies) => discrepancies,
            Err(e) => return Err(self.fail_stage(&slot, &mut record, &ticket, stage, e.into())),
        };

        if discrepancies.is_empty() {
            let summary = format!(
                "Verified {} citations against the evidence store with zero discrepancies",
                citation_count(&record.case)
            );
            if let Err(e) = self.advance(&slot, &mut record, &ticket, PipelineStage::Verified, &summary) {
                return Err(self.fail_stage(&slot, &mut record, &ticket, stage, e));
            }
            info!(case = %case_id, "narrative verified");
            return Ok(record.case.clone());
        }

        let mut tracker = record.tracker.clone();
        let rejected = tracker.reject_verification(&ticket).map_err(EngineError::from).and_then(|()| {
            let listed: Vec<String> = discrepancies.iter().map(ToString::to_string).collect();
            let detail = format!("{} discrepancies: {}", discrepancies.len(), listed.join("; "));
            self.record(&slot, &Actor::System, AuditAction::VerificationFailure, &detail)
        });
        if let Err(e) = rejected {
            return Err(self.fail_stage(&slot, &mut record, &ticket, stage, e));
        }
        record.tracker = tracker;

        warn!(case = %case_id, discrepancies = discrepancies.len(), "fact check failed");
        Err(EngineError::VerificationFailure { discrepancies })
    }

    /// Escalate and lock the case. Available at any pipeline stage; an
    /// outstanding pipeline run is cancelled and its result discarded.
    pub async fn escalate(&self, case_id: &CaseId, actor: &Actor) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;

        let from = record.case.status;
        machine::validate_transition(from, CaseStatus::Escalated)?;

        let interrupted = record.tracker.is_in_flight().then(|| record.tracker.stage());
        let mut detail = format!("Case escalated by {actor} from {from}.");
        if let Some(stage) = interrupted {
            detail.push_str(&format!(" In-flight {stage} run cancelled."));
        }
        self.record(&slot, actor, AuditAction::Escalation, &detail)?;
        record.tracker.cancel();
        record.case.status = CaseStatus::Escalated;

        info!(case = %case_id, %actor, from = %from, interrupted = ?interrupted, "case escalated");
        Ok(record.case.clone())
    }

    /// Approve a verified narrative for filing.
    pub async fn submit_for_filing(&self, case_id: &CaseId, actor: &Actor) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;

        let from = record.case.status;
        if from.is_locked() || from.is_terminal() {
            return Err(EngineError::guard(format!("case is {from}")));
        }
        let stage = record.tracker.stage();
        if stage != PipelineStage::Verified {
            return Err(EngineError::guard(format!(
                "pipeline stage is {stage}; the narrative must be verified"
            )));
        }
        machine::validate_transition(from, CaseStatus::ReadyForFiling)?;

        self.record(
            &slot,
            actor,
            AuditAction::SarApproved,
            &format!("SAR approved for filing by {actor}."),
        )?;
        record.case.status = CaseStatus::ReadyForFiling;

        info!(case = %case_id, %actor, "SAR approved for filing");
        Ok(record.case.clone())
    }

    /// File the SAR. Terminal.
    pub async fn file(&self, case_id: &CaseId, actor: &Actor) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;

        let from = record.case.status;
        if from != CaseStatus::ReadyForFiling {
            return Err(EngineError::guard(format!(
                "case is {from}; only a case Ready for Filing can be filed"
            )));
        }
        machine::validate_transition(from, CaseStatus::Filed)?;

        self.record(
            &slot,
            actor,
            AuditAction::SarFiled,
            &format!("SAR filed by {actor} on behalf of {}.", self.config.filing_institution),
        )?;
        record.case.status = CaseStatus::Filed;
        record.filed_on = Some(Utc::now().date_naive());

        info!(case = %case_id, %actor, "SAR filed");
        Ok(record.case.clone())
    }

    /// Discard the narrative and return the pipeline to `idle`. Only from
    /// `complete` or `verified`.
    pub async fn reset_narrative(&self, case_id: &CaseId) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;
        machine::ensure_unlocked(record.case.status)?;

        let from = record.tracker.stage();
        let mut tracker = record.tracker.clone();
        tracker.reset()?;
        let index = CrossReferenceIndex::build(&record.case.transactions, &record.case.typologies, &[])?;

        let detail = format!(
            "Discarded {}-section narrative at stage {from}.",
            record.sections().len()
        );
        self.record(&slot, &Actor::System, AuditAction::NarrativeReset, &detail)?;
        record.tracker = tracker;
        record.case.narrative = None;
        record.retrieved.clear();
        record.index = index;

        info!(case = %case_id, from = %from, "narrative reset");
        Ok(record.case.clone())
    }

    /// Replace one section of a `complete` narrative. The edited narrative
    /// must pass fact checking again before it can be submitted.
    pub async fn edit_section(
        &self,
        case_id: &CaseId,
        actor: &Actor,
        section_id: &SectionId,
        body: String,
        citations: Vec<TransactionId>,
    ) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;
        machine::ensure_unlocked(record.case.status)?;

        let stage = record.tracker.stage();
        if record.tracker.is_in_flight() {
            return Err(EngineError::PipelineBusy { stage });
        }
        if stage != PipelineStage::Complete {
            return Err(EngineError::guard(format!(
                "narrative can only be edited at stage complete, pipeline is at {stage}"
            )));
        }

        let not_found = || EngineError::SectionNotFound {
            case: case_id.clone(),
            section: section_id.clone(),
        };
        let narrative = record.case.narrative.as_ref().ok_or_else(not_found)?;
        let generated_at = narrative.generated_at;
        let mut sections = narrative.sections.clone();
        let section = sections
            .iter_mut()
            .find(|s| &s.id == section_id)
            .ok_or_else(not_found)?;
        let cited = citations.len();
        section.body = body;
        section.citations = citations;

        let index = match CrossReferenceIndex::build(&record.case.transactions, &record.case.typologies, &sections) {
            Ok(index) => index,
            Err(e) => {
                let err = EngineError::from(e);
                if err.is_integrity() {
                    self.record_integrity(&slot, &err);
                }
                return Err(err);
            }
        };

        self.record(
            &slot,
            actor,
            AuditAction::NarrativeEdited,
            &format!("Section {section_id} edited by {actor}; cites {cited} transactions."),
        )?;
        record.case.narrative = Some(Narrative {
            sections,
            generated_at,
        });
        record.index = index;

        info!(case = %case_id, section = %section_id, %actor, "narrative section edited");
        Ok(record.case.clone())
    }

    /// Append a correcting transaction that supersedes an existing one.
    /// Evidence is never edited in place.
    pub async fn correct_transaction(
        &self,
        case_id: &CaseId,
        actor: &Actor,
        mut correction: Transaction,
        supersedes: TransactionId,
    ) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let mut record = slot.record.lock().await;

        let status = record.case.status;
        if status.is_locked() || status.is_terminal() {
            return Err(EngineError::guard(format!("case is {status}; evidence is frozen")));
        }
        let stage = record.tracker.stage();
        if record.tracker.is_in_flight() {
            return Err(EngineError::PipelineBusy { stage });
        }
        if stage == PipelineStage::Verified {
            return Err(EngineError::guard(
                "the narrative is verified; reset it before correcting evidence",
            ));
        }
        if !record.case.has_transaction(&supersedes) {
            let err = EngineError::DanglingReference {
                referrer: format!("correction {}", correction.id),
                transaction: supersedes,
            };
            self.record_integrity(&slot, &err);
            return Err(err);
        }
        if record.case.has_transaction(&correction.id) {
            return Err(EngineError::InvalidInput(format!(
                "transaction {} already exists in case {case_id}",
                correction.id
            )));
        }
        if let Some(reason) = slot.audit.sealed_reason()? {
            return Err(EngineError::ChainIntegrity {
                case: case_id.clone(),
                reason,
            });
        }

        correction.supersedes = Some(supersedes.clone());
        let mut transactions = record.case.transactions.clone();
        transactions.push(correction.clone());
        let index = CrossReferenceIndex::build(&transactions, &record.case.typologies, record.sections())?;

        self.evidence().append_correction(case_id, correction.clone()).await?;
        self.record(
            &slot,
            actor,
            AuditAction::EvidenceCorrection,
            &format!(
                "{} supersedes {supersedes}: {}.",
                correction.id,
                correction.evidence_reference()
            ),
        )?;
        record.case.transactions = transactions;
        record.index = index;

        info!(case = %case_id, transaction = %correction.id, %supersedes, "evidence corrected");
        Ok(record.case.clone())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub async fn get_case(&self, case_id: &CaseId) -> EngineResult<Case> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        Ok(record.case.clone())
    }

    /// The full audit trail, oldest first. Never waits on the case lock.
    pub fn get_audit_log(&self, case_id: &CaseId) -> EngineResult<Vec<AuditEvent>> {
        Ok(self.slot(case_id)?.audit.events()?)
    }

    pub fn audit_tail(&self, case_id: &CaseId, n: usize) -> EngineResult<Vec<AuditEvent>> {
        Ok(self.slot(case_id)?.audit.tail(n)?)
    }

    /// Recompute the case's hash chain. A failure seals the log against
    /// further writes.
    pub fn verify_audit_chain(&self, case_id: &CaseId) -> EngineResult<bool> {
        let valid = self.slot(case_id)?.audit.verify_chain()?;
        if !valid {
            warn!(case = %case_id, "audit chain verification failed; log sealed");
        }
        Ok(valid)
    }

    /// Sections citing `transaction_id`.
    pub async fn citations_for(
        &self,
        case_id: &CaseId,
        transaction_id: &TransactionId,
    ) -> EngineResult<Vec<SectionId>> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        let sections = record
            .index
            .citations_for(transaction_id)
            .map_err(|e| lookup_error(case_id, e))?;
        Ok(sections.iter().cloned().collect())
    }

    /// Typologies referencing `transaction_id`.
    pub async fn typologies_for(
        &self,
        case_id: &CaseId,
        transaction_id: &TransactionId,
    ) -> EngineResult<Vec<TypologyId>> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        let typologies = record
            .index
            .typologies_for(transaction_id)
            .map_err(|e| lookup_error(case_id, e))?;
        Ok(typologies.iter().cloned().collect())
    }

    /// Transactions cited by `section_id`, in citation order.
    pub async fn transactions_for(
        &self,
        case_id: &CaseId,
        section_id: &SectionId,
    ) -> EngineResult<Vec<TransactionId>> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        let transactions = record
            .index
            .transactions_for(section_id)
            .map_err(|e| lookup_error(case_id, e))?;
        Ok(transactions.to_vec())
    }

    pub async fn pipeline_status(&self, case_id: &CaseId) -> EngineResult<PipelineStatus> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        Ok(record.tracker.status())
    }

    /// Assemble the SAR for a case whose narrative is at `complete` or later.
    pub async fn sar_report(&self, case_id: &CaseId) -> EngineResult<SarReport> {
        let slot = self.slot(case_id)?;
        let record = slot.record.lock().await;
        let stage = record.tracker.stage();
        if !stage.has_narrative() {
            return Err(EngineError::guard(format!(
                "no narrative to report; pipeline is at {stage}"
            )));
        }
        SarReport::assemble(&record.case, &self.config.filing_institution)
            .ok_or_else(|| EngineError::guard("no narrative to report"))
    }

    /// Every case not yet filed, newest first.
    pub async fn active_cases(&self) -> EngineResult<Vec<CaseSummary>> {
        let mut active = Vec::new();
        for slot in self.slots()? {
            let record = slot.record.lock().await;
            if record.case.status != CaseStatus::Filed {
                active.push((record.case.opened_on, slot.ordinal, record.case.summary()));
            }
        }
        active.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(active.into_iter().map(|(_, _, summary)| summary).collect())
    }

    pub async fn dashboard_metrics(&self) -> EngineResult<DashboardMetrics> {
        let mut snapshot = Vec::new();
        for slot in self.slots()? {
            let record = slot.record.lock().await;
            snapshot.push((record.case.clone(), record.filed_on));
        }
        Ok(DashboardMetrics::tally(
            snapshot.iter().map(|(case, filed_on)| (case, *filed_on)),
        ))
    }

    pub fn case_ids(&self) -> EngineResult<Vec<CaseId>> {
        Ok(self.read_cases()?.keys().cloned().collect())
    }

    // ---------------------------------------------------------------
    // Pipeline steps
    // ---------------------------------------------------------------

    async fn retrieve_step(&self, slot: &CaseSlot, ticket: &RunTicket) -> EngineResult<PipelineStage> {
        let stage = PipelineStage::Retrieving;
        let case_id = self.reacquire(slot, ticket, stage).await?.case.id.clone();

        let result = self.pipeline.retrieve(&case_id).await;
        let mut record = self.reacquire(slot, ticket, stage).await?;
        let outcome = match result {
            Ok(transactions) => {
                let flagged = transactions.iter().filter(|t| t.flagged).count();
                let summary = format!(
                    "Retrieved {} transactions ({flagged} flagged) from the evidence store",
                    transactions.len()
                );
                let advanced =
                    self.advance(slot, &mut record, ticket, PipelineStage::Analyzing, &summary);
                if advanced.is_ok() {
                    record.retrieved = transactions;
                }
                advanced
            }
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(()) => Ok(PipelineStage::Analyzing),
            Err(e) => Err(self.fail_stage(slot, &mut record, ticket, stage, e)),
        }
    }

    async fn analyze_step(&self, slot: &CaseSlot, ticket: &RunTicket) -> EngineResult<PipelineStage> {
        let stage = PipelineStage::Analyzing;
        let transactions = self.reacquire(slot, ticket, stage).await?.retrieved.clone();

        let result = self.pipeline.analyze(&transactions).await;
        let mut record = self.reacquire(slot, ticket, stage).await?;
        let outcome = match result {
            Ok(detected) => self.commit_analysis(slot, &mut record, ticket, detected),
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(()) => Ok(PipelineStage::Drafting),
            Err(e) => Err(self.fail_stage(slot, &mut record, ticket, stage, e)),
        }
    }

    async fn draft_step(&self, slot: &CaseSlot, ticket: &RunTicket) -> EngineResult<PipelineStage> {
        let stage = PipelineStage::Drafting;
        let (context, transactions, typologies) = {
            let record = self.reacquire(slot, ticket, stage).await?;
            let context = DraftContext {
                case_id: record.case.id.clone(),
                customer: record.case.customer.clone(),
            };
            (context, record.retrieved.clone(), record.case.typologies.clone())
        };

        let result = self.pipeline.draft(&context, &transactions, &typologies).await;
        let mut record = self.reacquire(slot, ticket, stage).await?;
        let outcome = match result {
            Ok(draft) => self.commit_draft(slot, &mut record, ticket, draft),
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(()) => Ok(PipelineStage::Complete),
            Err(e) => Err(self.fail_stage(slot, &mut record, ticket, stage, e)),
        }
    }

    /// Merge detected typologies by id. Existing entries are kept as they
    /// are unless they relate a superseded transaction: those are replaced by
    /// the fresh detection of the same id, or withdrawn when it is no longer
    /// detected.
    fn commit_analysis(
        &self,
        slot: &CaseSlot,
        record: &mut CaseRecord,
        ticket: &RunTicket,
        detected: Vec<Typology>,
    ) -> EngineResult<()> {
        let superseded: HashSet<&TransactionId> = record
            .case
            .transactions
            .iter()
            .filter_map(|t| t.supersedes.as_ref())
            .collect();
        let mut typologies = Vec::with_capacity(record.case.typologies.len() + detected.len());
        let (mut revised, mut withdrawn) = (0usize, 0usize);
        for existing in &record.case.typologies {
            if !existing.related_transactions.iter().any(|id| superseded.contains(id)) {
                typologies.push(existing.clone());
                continue;
            }
            match detected.iter().find(|t| t.id == existing.id) {
                Some(fresh) => {
                    typologies.push(fresh.clone());
                    revised += 1;
                }
                None => withdrawn += 1,
            }
        }

        let known: HashSet<TypologyId> = typologies.iter().map(|t| t.id.clone()).collect();
        let added: Vec<Typology> = detected
            .iter()
            .filter(|t| !known.contains(&t.id))
            .cloned()
            .collect();
        let added_count = added.len();
        typologies.extend(added);
        let index = CrossReferenceIndex::build(&record.case.transactions, &typologies, record.sections())?;

        let mut summary = if detected.is_empty() {
            "No typologies detected".to_string()
        } else {
            format!("Detected {} ({added_count} new)", describe_typologies(&detected))
        };
        if revised + withdrawn > 0 {
            summary.push_str(&format!(
                "; {revised} revised and {withdrawn} withdrawn after evidence corrections"
            ));
        }
        self.advance(slot, record, ticket, PipelineStage::Drafting, &summary)?;
        record.case.typologies = typologies;
        record.index = index;
        Ok(())
    }

    fn commit_draft(
        &self,
        slot: &CaseSlot,
        record: &mut CaseRecord,
        ticket: &RunTicket,
        draft: Draft,
    ) -> EngineResult<()> {
        let cited: BTreeSet<&TransactionId> =
            draft.sections.iter().flat_map(|s| &s.citations).collect();
        let summary = format!(
            "Drafted {} sections citing {} transactions",
            draft.sections.len(),
            cited.len()
        );
        self.advance(slot, record, ticket, PipelineStage::Complete, &summary)?;
        record.case.narrative = Some(Narrative::new(draft.sections));
        record.index = draft.index;
        Ok(())
    }

    /// Lock the case again after a delegation. Fails if the run was
    /// cancelled meanwhile; the caller then drops whatever it computed.
    async fn reacquire<'a>(
        &self,
        slot: &'a CaseSlot,
        ticket: &RunTicket,
        stage: PipelineStage,
    ) -> EngineResult<MutexGuard<'a, CaseRecord>> {
        let record = slot.record.lock().await;
        if record.tracker.is_current(ticket) && !record.case.status.is_locked() {
            return Ok(record);
        }
        debug!(
            case = %record.case.id,
            %stage,
            status = %record.case.status,
            "discarding result of cancelled pipeline run"
        );
        Err(EngineError::guard(format!(
            "the {stage} run was cancelled; case is {}",
            record.case.status
        )))
    }

    /// Move the pipeline to `to` for the current run: one audit entry, then
    /// the tracker and the projected status.
    fn advance(
        &self,
        slot: &CaseSlot,
        record: &mut CaseRecord,
        ticket: &RunTicket,
        to: PipelineStage,
        summary: &str,
    ) -> EngineResult<()> {
        let mut tracker = record.tracker.clone();
        tracker.advance(ticket, to)?;
        self.enter_stage(slot, record, to, summary)?;
        record.tracker = tracker;
        Ok(())
    }

    fn enter_stage(
        &self,
        slot: &CaseSlot,
        record: &mut CaseRecord,
        stage: PipelineStage,
        summary: &str,
    ) -> EngineResult<()> {
        let from = record.case.status;
        let projected = machine::projected_status(from, stage);
        let detail = match projected {
            Some(to) => format!("{summary}. Status {from} -> {to}."),
            None => format!("{summary}."),
        };
        self.record(slot, &Actor::System, AuditAction::PipelineStage(stage.to_string()), &detail)?;
        if let Some(to) = projected {
            record.case.status = to;
        }
        debug!(case = %record.case.id, %stage, status = %record.case.status, "pipeline stage entered");
        Ok(())
    }

    /// End the run without moving the stage, leaving it retryable.
    fn fail_stage(
        &self,
        slot: &CaseSlot,
        record: &mut CaseRecord,
        ticket: &RunTicket,
        stage: PipelineStage,
        err: EngineError,
    ) -> EngineError {
        record.tracker.release(ticket);
        warn!(case = %record.case.id, %stage, error = %err, "pipeline stage failed");
        if err.is_integrity() {
            self.record_integrity(slot, &err);
        }
        err
    }

    // ---------------------------------------------------------------
    // Audit and registry helpers
    // ---------------------------------------------------------------

    fn record(
        &self,
        slot: &CaseSlot,
        actor: &Actor,
        action: AuditAction,
        detail: &str,
    ) -> EngineResult<AuditEvent> {
        Ok(slot.audit.append(actor, action, detail)?)
    }

    /// Put an integrity failure on the case's trail. A sealed log refuses
    /// the entry; that refusal is only logged.
    fn record_integrity(&self, slot: &CaseSlot, err: &EngineError) {
        let case = slot.audit.case_id();
        warn!(case = %case, error = %err, "integrity violation");
        if let Err(audit_err) =
            slot.audit
                .append(&Actor::System, AuditAction::IntegrityViolation, &err.to_string())
        {
            warn!(case = %case, error = %audit_err, "integrity violation not recorded");
        }
    }

    fn next_case_id(&self, opened_on: NaiveDate) -> EngineResult<CaseId> {
        let cases = self.read_cases()?;
        loop {
            let seq = self.next_sequence.fetch_add(1, Ordering::SeqCst);
            let candidate = CaseId::from(
                format!("{}-{}-{seq:03}", self.config.case_id_prefix, opened_on.year()).as_str(),
            );
            if !cases.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    fn slot(&self, case_id: &CaseId) -> EngineResult<Arc<CaseSlot>> {
        self.read_cases()?
            .get(case_id)
            .cloned()
            .ok_or_else(|| EngineError::CaseNotFound(case_id.clone()))
    }

    fn slots(&self) -> EngineResult<Vec<Arc<CaseSlot>>> {
        Ok(self.read_cases()?.values().cloned().collect())
    }

    fn read_cases(&self) -> EngineResult<RwLockReadGuard<'_, BTreeMap<CaseId, Arc<CaseSlot>>>> {
        self.cases
            .read()
            .map_err(|_| EngineError::Internal("case registry lock poisoned".into()))
    }

    fn write_cases(&self) -> EngineResult<RwLockWriteGuard<'_, BTreeMap<CaseId, Arc<CaseSlot>>>> {
        self.cases
            .write()
            .map_err(|_| EngineError::Internal("case registry lock poisoned".into()))
    }
}

impl std::fmt::Debug for CaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseEngine")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Check a new case's input and build its initial index.
fn validate_new_case(
    customer: &Customer,
    risk_score: u8,
    transactions: &[Transaction],
    typologies: &[Typology],
) -> EngineResult<CrossReferenceIndex> {
    if risk_score > 100 {
        return Err(EngineError::InvalidInput(format!(
            "risk score {risk_score} is outside 0-100"
        )));
    }
    if customer.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("customer name is empty".into()));
    }
    let mut seen = HashSet::new();
    for tx in transactions {
        if !seen.insert(&tx.id) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate transaction id {}",
                tx.id
            )));
        }
    }
    for typology in typologies {
        typology
            .validate()
            .map_err(|e| EngineError::InvalidInput(format!("typology {}: {e}", typology.id)))?;
    }
    Ok(CrossReferenceIndex::build(transactions, typologies, &[])?)
}

fn describe_typologies(typologies: &[Typology]) -> String {
    typologies
        .iter()
        .map(|t| format!("{} ({}% confidence)", t.name, t.confidence_percent()))
        .collect::<Vec<_>>()
        .join("; ")
}

fn citation_count(case: &Case) -> usize {
    case.narrative.as_ref().map_or(0, Narrative::citation_count)
}

fn lookup_error(case: &CaseId, err: IndexError) -> EngineError {
    match err {
        IndexError::UnknownTransaction(transaction) => EngineError::TransactionNotFound {
            case: case.clone(),
            transaction,
        },
        IndexError::UnknownSection(section) => EngineError::SectionNotFound {
            case: case.clone(),
            section,
        },
        other => other.into(),
    }
}
