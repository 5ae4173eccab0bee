//! Case investigation workflow engine.
//!
//! [`CaseEngine`] owns every SAR case: its status in the filing workflow,
//! its narrative pipeline, its evidence cross-reference index and its
//! hash-chained audit log. Callers interact only through commands
//! (`create_case`, `start_narrative`, `escalate`, ...) and queries
//! (`get_case`, `get_audit_log`, `citations_for`, ...).
//!
//! # Architecture
//!
//! ```text
//! command ──► per-case lock ──► guard check ──► audit append ──► commit
//!                  │
//!                  └─ released while a pipeline stage is delegated
//! ```
//!
//! Every command either appends its audit entry and applies its change, or
//! returns an error and leaves the case untouched.

pub mod config;
pub mod engine;
pub mod error;
pub mod machine;
pub mod metrics;
mod record;
pub mod report;
pub mod sample;

pub use config::EngineConfig;
pub use engine::{CaseEngine, NewCase};
pub use error::{EngineError, EngineResult};
pub use metrics::DashboardMetrics;
pub use report::{ReportSection, SarReport, SubjectInformation, SuspiciousActivityInformation};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use sar_audit::AuditAction;
    use sar_evidence::{EvidenceStore, InMemoryEvidenceStore};
    use sar_pipeline::{
        DraftContext, EvidenceFactChecker, NarrativeGenerator, NarrativePipeline, PipelineConfig,
        PipelineResult, PipelineStage, RuleBasedDetector, TemplateGenerator, TypologyDetector,
    };
    use sar_types::{
        Actor, CaseId, CaseStatus, Customer, Direction, Instrument, Money, NarrativeSection,
        SectionId, Transaction, TransactionId, Typology,
    };
    use tokio::sync::Notify;

    use super::*;
    use crate::sample::{sample_case, sample_case_undetected, SAMPLE_CASE_ID};

    fn analyst() -> Actor {
        Actor::user("Sarah Jenkins")
    }

    fn case_id() -> CaseId {
        SAMPLE_CASE_ID.into()
    }

    fn ids(raw: &[&str]) -> Vec<TransactionId> {
        raw.iter().map(|id| TransactionId::from(*id)).collect()
    }

    fn structuring_section() -> SectionId {
        "activity-typ-01".into()
    }

    fn engine_with(
        detector: Arc<dyn TypologyDetector>,
        generator: Arc<dyn NarrativeGenerator>,
        config: PipelineConfig,
    ) -> CaseEngine {
        let evidence: Arc<dyn EvidenceStore> = Arc::new(InMemoryEvidenceStore::new());
        let checker = Arc::new(EvidenceFactChecker::new(Arc::clone(&evidence)));
        let pipeline = NarrativePipeline::new(evidence, detector, generator, checker, config);
        CaseEngine::with_pipeline(EngineConfig::default(), pipeline)
    }

    async fn sample_engine() -> CaseEngine {
        let engine = CaseEngine::new(EngineConfig::default());
        engine.create_case(sample_case_undetected()).await.unwrap();
        engine
    }

    /// Engine with the sample case at pipeline stage `complete`.
    async fn drafted_engine() -> CaseEngine {
        let engine = sample_engine().await;
        engine.start_narrative(&case_id()).await.unwrap();
        engine
    }

    async fn actions(engine: &CaseEngine) -> Vec<String> {
        engine
            .get_audit_log(&case_id())
            .unwrap()
            .iter()
            .map(|e| e.action.to_string())
            .collect()
    }

    /// Template generator that parks inside `draft` until released.
    struct GatedGenerator {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl NarrativeGenerator for GatedGenerator {
        fn name(&self) -> &str {
            "gated-generator"
        }

        async fn draft(
            &self,
            context: &DraftContext,
            transactions: &[Transaction],
            typologies: &[Typology],
        ) -> PipelineResult<Vec<NarrativeSection>> {
            self.entered.notify_one();
            self.release.notified().await;
            TemplateGenerator::new()
                .draft(context, transactions, typologies)
                .await
        }
    }

    /// Detector whose first call hangs past any timeout.
    struct FlakyDetector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TypologyDetector for FlakyDetector {
        fn name(&self) -> &str {
            "flaky-detector"
        }

        async fn detect(&self, transactions: &[Transaction]) -> PipelineResult<Vec<Typology>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            RuleBasedDetector::default().detect(transactions).await
        }
    }

    fn gated_engine() -> (Arc<CaseEngine>, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let engine = engine_with(
            Arc::new(RuleBasedDetector::default()),
            Arc::new(GatedGenerator {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            }),
            PipelineConfig::default(),
        );
        (Arc::new(engine), entered, release)
    }

    // -----------------------------------------------------------------------
    // 1. Full investigation of SAR-2023-001
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sample_case_runs_to_filed() {
        let engine = sample_engine().await;
        let id = case_id();

        let err = engine.submit_for_filing(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        let case = engine.start_narrative(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::Drafting);
        assert_eq!(
            engine.pipeline_status(&id).await.unwrap().stage,
            PipelineStage::Complete
        );
        assert_eq!(
            engine.transactions_for(&id, &structuring_section()).await.unwrap(),
            ids(&["TRX-8921", "TRX-8922", "TRX-8941"])
        );

        // Complete is not verified.
        let err = engine.submit_for_filing(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        let case = engine.run_fact_check(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::QaPending);
        assert_eq!(
            engine.pipeline_status(&id).await.unwrap().stage,
            PipelineStage::Verified
        );

        let case = engine.submit_for_filing(&id, &analyst()).await.unwrap();
        assert_eq!(case.status, CaseStatus::ReadyForFiling);
        let case = engine.file(&id, &analyst()).await.unwrap();
        assert_eq!(case.status, CaseStatus::Filed);

        assert_eq!(
            actions(&engine).await,
            [
                "Case Created",
                "Data Ingestion",
                "Pipeline Stage: retrieving",
                "Pipeline Stage: analyzing",
                "Pipeline Stage: drafting",
                "Pipeline Stage: complete",
                "Pipeline Stage: fact_checking",
                "Pipeline Stage: verified",
                "SAR Approved",
                "SAR Filed",
            ]
        );
        assert!(engine.verify_audit_chain(&id).unwrap());
    }

    #[tokio::test]
    async fn citations_are_exact_inverse_of_sections() {
        let engine = drafted_engine().await;
        let id = case_id();

        let cited = engine.citations_for(&id, &"TRX-8921".into()).await.unwrap();
        assert!(cited.contains(&structuring_section()));
        let uncited = engine.citations_for(&id, &"TRX-8940".into()).await.unwrap();
        assert!(uncited.is_empty());
        let wire = engine.citations_for(&id, &"TRX-8925".into()).await.unwrap();
        assert!(!wire.contains(&structuring_section()));

        let typologies = engine.typologies_for(&id, &"TRX-8955".into()).await.unwrap();
        assert_eq!(typologies, vec!["TYP-02".into()]);

        let err = engine.citations_for(&id, &"TRX-0000".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn seeded_typologies_are_kept_on_detection() {
        let engine = CaseEngine::new(EngineConfig::default());
        engine.create_case(sample_case()).await.unwrap();
        let case = engine.start_narrative(&case_id()).await.unwrap();

        assert_eq!(case.typologies.len(), 2);
        assert!(case.typologies[0].rationale[0].starts_with("Multiple cash deposits between $9,500"));
        assert!(actions(&engine).await.contains(&"Typology Scan".to_string()));
    }

    // -----------------------------------------------------------------------
    // 2. Escalation and cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn escalate_mid_drafting_discards_draft() {
        let (engine, entered, release) = gated_engine();
        let id = case_id();
        engine.create_case(sample_case_undetected()).await.unwrap();

        let runner = tokio::spawn({
            let engine = Arc::clone(&engine);
            let id = id.clone();
            async move { engine.start_narrative(&id).await }
        });
        entered.notified().await;

        // Queries are not blocked behind the outstanding delegation.
        let during = engine.get_case(&id).await.unwrap();
        assert_eq!(during.status, CaseStatus::Drafting);
        let status = engine.pipeline_status(&id).await.unwrap();
        assert_eq!(status.stage, PipelineStage::Drafting);
        assert!(status.in_flight);

        let escalated = engine.escalate(&id, &analyst()).await.unwrap();
        assert_eq!(escalated.status, CaseStatus::Escalated);
        release.notify_one();

        let err = runner.await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        let case = engine.get_case(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::Escalated);
        assert!(case.narrative.is_none());
        let status = engine.pipeline_status(&id).await.unwrap();
        assert_eq!(status.stage, PipelineStage::Drafting);
        assert!(!status.in_flight);

        let log = engine.get_audit_log(&id).unwrap();
        assert_eq!(log.last().unwrap().action, AuditAction::Escalation);
        assert!(log.last().unwrap().detail.contains("In-flight drafting run cancelled"));
        assert!(engine.verify_audit_chain(&id).unwrap());
    }

    #[tokio::test]
    async fn concurrent_start_is_busy() {
        let (engine, entered, release) = gated_engine();
        let id = case_id();
        engine.create_case(sample_case_undetected()).await.unwrap();

        let runner = tokio::spawn({
            let engine = Arc::clone(&engine);
            let id = id.clone();
            async move { engine.start_narrative(&id).await }
        });
        entered.notified().await;

        let err = engine.start_narrative(&id).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::PipelineBusy {
                stage: PipelineStage::Drafting
            }
        );
        assert!(engine.reset_narrative(&id).await.unwrap_err().is_retryable());

        release.notify_one();
        let case = runner.await.unwrap().unwrap();
        assert!(case.narrative.is_some());
    }

    #[tokio::test]
    async fn escalation_blocked_once_ready_or_filed() {
        let engine = drafted_engine().await;
        let id = case_id();
        engine.run_fact_check(&id).await.unwrap();
        engine.submit_for_filing(&id, &analyst()).await.unwrap();

        let err = engine.escalate(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        engine.file(&id, &analyst()).await.unwrap();
        let err = engine.escalate(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));
    }

    // -----------------------------------------------------------------------
    // 3. Locked cases
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn locked_case_refuses_pipeline_and_freezes_narrative() {
        let engine = drafted_engine().await;
        let id = case_id();
        let before = engine.get_case(&id).await.unwrap().narrative;
        engine.escalate(&id, &analyst()).await.unwrap();

        for err in [
            engine.start_narrative(&id).await.unwrap_err(),
            engine.run_fact_check(&id).await.unwrap_err(),
            engine.reset_narrative(&id).await.unwrap_err(),
            engine
                .edit_section(&id, &analyst(), &structuring_section(), "x".into(), vec![])
                .await
                .unwrap_err(),
        ] {
            assert!(matches!(err, EngineError::GuardViolation { .. }), "{err}");
        }
        assert_eq!(engine.get_case(&id).await.unwrap().narrative, before);

        let err = engine.submit_for_filing(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));
    }

    #[tokio::test]
    async fn filed_requires_ready_for_filing() {
        let engine = drafted_engine().await;
        let id = case_id();
        let err = engine.file(&id, &analyst()).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));
        assert_eq!(engine.get_case(&id).await.unwrap().status, CaseStatus::Drafting);
    }

    // -----------------------------------------------------------------------
    // 4. Timeouts
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn timed_out_stage_is_retryable() {
        let engine = engine_with(
            Arc::new(FlakyDetector {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(TemplateGenerator::new()),
            PipelineConfig::uniform(Duration::from_millis(50)),
        );
        let id = case_id();
        engine.create_case(sample_case_undetected()).await.unwrap();

        let err = engine.start_narrative(&id).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::StageTimeout {
                stage: PipelineStage::Analyzing,
                after: Duration::from_millis(50),
            }
        );
        let status = engine.pipeline_status(&id).await.unwrap();
        assert_eq!(status.stage, PipelineStage::Analyzing);
        assert!(!status.in_flight);
        assert!(engine.get_case(&id).await.unwrap().narrative.is_none());

        let case = engine.start_narrative(&id).await.unwrap();
        assert!(case.narrative.is_some());
        let analyzing = actions(&engine)
            .await
            .into_iter()
            .filter(|a| a == "Pipeline Stage: analyzing")
            .count();
        assert_eq!(analyzing, 1);
    }

    // -----------------------------------------------------------------------
    // 5. Verification, edits and resets
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn edited_narrative_must_pass_fact_check_again() {
        let engine = drafted_engine().await;
        let id = case_id();

        engine
            .edit_section(
                &id,
                &analyst(),
                &structuring_section(),
                "Deposits TRX-8921 (USD 9,800.00 on 2023-10-12) and TRX-8922 (USD 5,900.00 on 2023-10-13).".into(),
                ids(&["TRX-8921", "TRX-8922"]),
            )
            .await
            .unwrap();
        assert_eq!(
            engine.transactions_for(&id, &structuring_section()).await.unwrap(),
            ids(&["TRX-8921", "TRX-8922"])
        );
        let cited = engine.citations_for(&id, &"TRX-8941".into()).await.unwrap();
        assert!(!cited.contains(&structuring_section()));

        let EngineError::VerificationFailure { discrepancies } =
            engine.run_fact_check(&id).await.unwrap_err()
        else {
            panic!("expected verification failure");
        };
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].transaction_id.as_str(), "TRX-8922");
        assert_eq!(
            engine.pipeline_status(&id).await.unwrap().stage,
            PipelineStage::Complete
        );
        assert!(engine.submit_for_filing(&id, &analyst()).await.is_err());

        let log = actions(&engine).await;
        assert!(log.contains(&"Narrative Edited".to_string()));
        assert_eq!(log.last().unwrap(), "Verification Failure");
    }

    #[tokio::test]
    async fn failed_fact_check_leaves_status_at_drafting() {
        let engine = drafted_engine().await;
        let id = case_id();

        engine
            .edit_section(
                &id,
                &analyst(),
                &structuring_section(),
                "Deposit TRX-8921 (USD 8,900.00 on 2023-10-12).".into(),
                ids(&["TRX-8921"]),
            )
            .await
            .unwrap();
        assert_eq!(engine.get_case(&id).await.unwrap().status, CaseStatus::Drafting);

        let err = engine.run_fact_check(&id).await.unwrap_err();
        assert!(matches!(err, EngineError::VerificationFailure { .. }));
        assert_eq!(engine.get_case(&id).await.unwrap().status, CaseStatus::Drafting);
        let log = engine.get_audit_log(&id).unwrap();
        assert!(log.iter().all(|e| !e.detail.contains("QA Pending")));

        engine
            .edit_section(
                &id,
                &analyst(),
                &structuring_section(),
                "Deposit TRX-8921 (USD 9,800.00 on 2023-10-12).".into(),
                ids(&["TRX-8921"]),
            )
            .await
            .unwrap();
        let case = engine.run_fact_check(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::QaPending);
        let verified = engine.audit_tail(&id, 1).unwrap();
        assert!(verified[0].detail.ends_with("Status Drafting -> QA Pending."));
    }

    #[tokio::test]
    async fn phantom_citation_in_edit_is_recorded() {
        let engine = drafted_engine().await;
        let id = case_id();
        let before = engine.get_case(&id).await.unwrap();

        let err = engine
            .edit_section(
                &id,
                &analyst(),
                &structuring_section(),
                "See TRX-9999.".into(),
                ids(&["TRX-9999"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DanglingReference { .. }));
        assert_eq!(engine.get_case(&id).await.unwrap(), before);
        assert_eq!(actions(&engine).await.last().unwrap(), "Integrity Violation");

        let err = engine
            .edit_section(&id, &analyst(), &"appendix".into(), String::new(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SectionNotFound { .. }));
    }

    #[tokio::test]
    async fn reset_returns_to_idle_and_status_holds() {
        let engine = drafted_engine().await;
        let id = case_id();

        let case = engine.reset_narrative(&id).await.unwrap();
        assert!(case.narrative.is_none());
        assert_eq!(case.status, CaseStatus::Drafting);
        assert_eq!(
            engine.pipeline_status(&id).await.unwrap().stage,
            PipelineStage::Idle
        );
        assert_eq!(actions(&engine).await.last().unwrap(), "Narrative Reset");

        let err = engine.reset_narrative(&id).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        let case = engine.start_narrative(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::Drafting);
        assert!(case.narrative.is_some());
    }

    // -----------------------------------------------------------------------
    // 6. Assignment, corrections and creation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn assign_once_to_named_user() {
        let engine = sample_engine().await;
        let id = case_id();

        let err = engine.assign(&id, &Actor::System).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let case = engine.assign(&id, &analyst()).await.unwrap();
        assert_eq!(case.assignee.as_deref(), Some("Sarah Jenkins"));
        let err = engine.assign(&id, &Actor::user("Mike Ross")).await.unwrap_err();
        assert!(matches!(err, EngineError::GuardViolation { .. }));

        let last = engine.audit_tail(&id, 1).unwrap();
        assert_eq!(last[0].action, AuditAction::CaseAssignment);
        assert_eq!(last[0].actor, analyst());
    }

    fn correction(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            timestamp: Utc.with_ymd_and_hms(2023, 10, 13, 10, 0, 0).unwrap(),
            amount: Money::from_major(5_900, "USD"),
            counterparty: "Cash Deposit".into(),
            instrument: Instrument::Cash,
            direction: Direction::Inbound,
            flagged: true,
            description: Some("Teller keyed the wrong amount".into()),
            supersedes: None,
        }
    }

    #[tokio::test]
    async fn corrections_append_and_never_edit() {
        let engine = sample_engine().await;
        let id = case_id();

        let case = engine
            .correct_transaction(&id, &analyst(), correction("TRX-8922-C"), "TRX-8922".into())
            .await
            .unwrap();
        assert_eq!(case.transactions.len(), 7);
        assert_eq!(
            case.transaction(&"TRX-8922".into()).unwrap().amount,
            Money::from_major(9_500, "USD")
        );
        assert_eq!(
            case.transaction(&"TRX-8922-C".into()).unwrap().supersedes,
            Some("TRX-8922".into())
        );
        assert_eq!(actions(&engine).await.last().unwrap(), "Evidence Correction");

        let err = engine
            .correct_transaction(&id, &analyst(), correction("TRX-7000-C"), "TRX-7000".into())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DanglingReference { .. }));
        assert_eq!(actions(&engine).await.last().unwrap(), "Integrity Violation");

        let err = engine
            .correct_transaction(&id, &analyst(), correction("TRX-8922-C"), "TRX-8921".into())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert_eq!(engine.get_case(&id).await.unwrap().transactions.len(), 7);
    }

    #[tokio::test]
    async fn correction_after_drafting_fails_fact_check() {
        let engine = drafted_engine().await;
        let id = case_id();
        engine
            .correct_transaction(&id, &analyst(), correction("TRX-8922-C"), "TRX-8922".into())
            .await
            .unwrap();

        let EngineError::VerificationFailure { discrepancies } =
            engine.run_fact_check(&id).await.unwrap_err()
        else {
            panic!("expected verification failure");
        };
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].transaction_id.as_str(), "TRX-8922");
        assert!(discrepancies[0].reason.contains("TRX-8922-C"));
        assert_eq!(engine.get_case(&id).await.unwrap().status, CaseStatus::Drafting);
        assert!(engine.submit_for_filing(&id, &analyst()).await.is_err());

        // Redrafting revises the structuring typology around the correction.
        engine.reset_narrative(&id).await.unwrap();
        let case = engine.start_narrative(&id).await.unwrap();
        assert_eq!(case.typologies[0].related_transactions, ids(&["TRX-8921", "TRX-8941"]));
        assert_eq!(
            engine.transactions_for(&id, &structuring_section()).await.unwrap(),
            ids(&["TRX-8921", "TRX-8941"])
        );
        let log = engine.get_audit_log(&id).unwrap();
        assert!(log.iter().any(|e| e.detail.contains("1 revised and 0 withdrawn")));

        let case = engine.run_fact_check(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::QaPending);
    }

    #[tokio::test]
    async fn correction_before_drafting_is_used_by_detection() {
        let engine = sample_engine().await;
        let id = case_id();
        engine
            .correct_transaction(&id, &analyst(), correction("TRX-8922-C"), "TRX-8922".into())
            .await
            .unwrap();

        engine.start_narrative(&id).await.unwrap();
        let cited = engine.citations_for(&id, &"TRX-8922".into()).await.unwrap();
        assert!(cited.is_empty());
        let structuring = engine.transactions_for(&id, &structuring_section()).await.unwrap();
        assert_eq!(structuring, ids(&["TRX-8921", "TRX-8941"]));

        let report = engine.sar_report(&id).await.unwrap();
        assert!(report
            .narrative
            .iter()
            .flat_map(|s| &s.supporting_evidence)
            .all(|t| t.as_str() != "TRX-8922"));

        let case = engine.run_fact_check(&id).await.unwrap();
        assert_eq!(case.status, CaseStatus::QaPending);
    }

    #[tokio::test]
    async fn create_case_validates_input() {
        let engine = sample_engine().await;

        let err = engine.create_case(sample_case()).await.unwrap_err();
        assert_eq!(err, EngineError::CaseExists(case_id()));

        let mut bad_risk = sample_case();
        bad_risk.id = Some("SAR-2023-900".into());
        bad_risk.risk_score = 101;
        assert!(matches!(
            engine.create_case(bad_risk).await.unwrap_err(),
            EngineError::InvalidInput(_)
        ));

        let mut dangling = sample_case();
        dangling.id = Some("SAR-2023-901".into());
        dangling.typologies[0].related_transactions.push("TRX-0000".into());
        assert!(matches!(
            engine.create_case(dangling).await.unwrap_err(),
            EngineError::DanglingReference { .. }
        ));

        let mut duplicate = sample_case();
        duplicate.id = Some("SAR-2023-902".into());
        duplicate.transactions.push(duplicate.transactions[0].clone());
        assert!(matches!(
            engine.create_case(duplicate).await.unwrap_err(),
            EngineError::InvalidInput(_)
        ));

        assert_eq!(engine.case_ids().unwrap(), vec![case_id()]);
    }

    fn low_risk_case(opened_on: NaiveDate) -> NewCase {
        NewCase {
            id: None,
            customer: Customer {
                id: "CUST-1029".into(),
                name: "Northwest Consulting Group".into(),
            },
            opened_on: Some(opened_on),
            risk_score: 45,
            transactions: vec![],
            typologies: vec![],
        }
    }

    #[tokio::test]
    async fn generated_ids_skip_taken_ones() {
        let engine = sample_engine().await;
        let opened = NaiveDate::from_ymd_opt(2023, 10, 25).unwrap();
        let case = engine.create_case(low_risk_case(opened)).await.unwrap();
        assert_eq!(case.id.as_str(), "SAR-2023-002");
        assert_eq!(case.status, CaseStatus::Open);
        assert_eq!(engine.get_audit_log(&case.id).unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // 7. Reporting
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sar_report_needs_a_narrative() {
        let engine = sample_engine().await;
        let id = case_id();
        assert!(matches!(
            engine.sar_report(&id).await.unwrap_err(),
            EngineError::GuardViolation { .. }
        ));

        engine.start_narrative(&id).await.unwrap();
        let report = engine.sar_report(&id).await.unwrap();
        assert_eq!(report.filing_institution, "SARaansh Financial Services");
        assert_eq!(report.subject_information.name, "Aries Import/Export Ltd.");
        assert_eq!(report.subject_information.risk_rating, sar_types::RiskLevel::High);
        let activity = &report.suspicious_activity_information;
        assert_eq!(activity.category.as_deref(), Some("Structuring / Smurfing"));
        assert_eq!(activity.cumulative_amount.to_string(), "USD 58,400.00");
        assert_eq!(activity.date_range_start, NaiveDate::from_ymd_opt(2023, 10, 12));
        assert_eq!(activity.date_range_end, NaiveDate::from_ymd_opt(2023, 10, 20));
        assert_eq!(report.narrative.len(), 4);
    }

    #[tokio::test]
    async fn dashboard_and_active_cases() {
        let engine = sample_engine().await;
        let opened = NaiveDate::from_ymd_opt(2023, 10, 25).unwrap();
        let other = engine.create_case(low_risk_case(opened)).await.unwrap();

        let active = engine.active_cases().await.unwrap();
        let listed: Vec<_> = active.iter().map(|s| s.id.clone()).collect();
        assert_eq!(listed, vec![other.id, case_id()]);

        let metrics = engine.dashboard_metrics().await.unwrap();
        assert_eq!(metrics.open_cases, 2);
        assert_eq!(metrics.high_risk_alerts, 1);
        assert_eq!(metrics.sars_filed, 0);
    }

    #[tokio::test]
    async fn audit_chain_holds_across_commands() {
        let engine = drafted_engine().await;
        let id = case_id();
        engine.assign(&id, &analyst()).await.unwrap();
        engine.run_fact_check(&id).await.unwrap();
        engine.reset_narrative(&id).await.unwrap();

        let log = engine.get_audit_log(&id).unwrap();
        for (i, event) in log.iter().enumerate() {
            assert_eq!(event.seq, i as u64 + 1);
        }
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(engine.verify_audit_chain(&id).unwrap());
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let engine = CaseEngine::new(EngineConfig::default());
        let id = CaseId::from("SAR-0000-000");
        assert!(matches!(
            engine.start_narrative(&id).await.unwrap_err(),
            EngineError::CaseNotFound(_)
        ));
        assert!(matches!(
            engine.get_audit_log(&id).unwrap_err(),
            EngineError::CaseNotFound(_)
        ));
    }
}
