use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use colored::Colorize;
use sar_audit::AuditEvent;
use sar_engine::sample::sample_case;
use sar_engine::{CaseEngine, EngineConfig};
use sar_evidence::{EvidenceStore, InMemoryEvidenceStore};
use sar_pipeline::{
    DraftContext, EvidenceFactChecker, NarrativeGenerator, NarrativePipeline, PipelineResult,
    PipelineStage, RuleBasedDetector, TemplateGenerator,
};
use sar_types::{Actor, Case, CaseId, CaseStatus, NarrativeSection, Transaction, Typology};
use serde_json::json;

use crate::cli::{DemoArgs, OutputFormat};
use crate::commands::load_engine_config;

/// Template generator that takes a while, like a remote model would.
struct PacedGenerator {
    delay: Duration,
}

#[async_trait]
impl NarrativeGenerator for PacedGenerator {
    fn name(&self) -> &str {
        "paced-template-generator"
    }

    async fn draft(
        &self,
        context: &DraftContext,
        transactions: &[Transaction],
        typologies: &[Typology],
    ) -> PipelineResult<Vec<NarrativeSection>> {
        tokio::time::sleep(self.delay).await;
        TemplateGenerator::new()
            .draft(context, transactions, typologies)
            .await
    }
}

fn build_engine(config: EngineConfig, draft_delay: Duration) -> Arc<CaseEngine> {
    let evidence: Arc<dyn EvidenceStore> = Arc::new(InMemoryEvidenceStore::new());
    let checker = Arc::new(EvidenceFactChecker::new(Arc::clone(&evidence)));
    let pipeline = NarrativePipeline::new(
        evidence,
        Arc::new(RuleBasedDetector::new(config.detection.clone())),
        Arc::new(PacedGenerator { delay: draft_delay }),
        checker,
        config.pipeline.clone(),
    );
    Arc::new(CaseEngine::with_pipeline(config, pipeline))
}

pub async fn run(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_engine_config(args.config.as_deref())?;
    let engine = build_engine(config, Duration::from_millis(args.draft_delay_ms));
    let analyst = Actor::user(args.analyst.as_str());
    let text = format == OutputFormat::Text;

    let case = engine.create_case(sample_case()).await?;
    let id = case.id.clone();
    tracing::debug!(case = %id, escalate = args.escalate_mid_draft, "demo case created");
    if text {
        print_header(&case);
    }

    let case = engine.assign(&id, &analyst).await?;
    step(text, "Assigned", &case);

    if args.escalate_mid_draft {
        escalate_mid_draft(&engine, &id, &analyst, text).await?;
    } else {
        let case = engine.start_narrative(&id).await?;
        step(text, "Narrative drafted", &case);
        let case = engine.run_fact_check(&id).await?;
        step(text, "Fact check passed", &case);
        let case = engine.submit_for_filing(&id, &analyst).await?;
        step(text, "Approved", &case);
        let case = engine.file(&id, &analyst).await?;
        step(text, "Filed", &case);
    }

    let case = engine.get_case(&id).await?;
    let audit = engine.get_audit_log(&id)?;
    let chain_valid = engine.verify_audit_chain(&id)?;

    if text {
        print_narrative(&engine, &case).await?;
        print_audit(&audit, chain_valid);
    } else {
        let report = engine.sar_report(&id).await.ok();
        let out = json!({
            "case": case,
            "pipeline": engine.pipeline_status(&id).await?,
            "report": report,
            "audit": audit,
            "chain_valid": chain_valid,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

/// Start the narrative in the background and escalate once drafting is
/// outstanding. The cancelled run must fail and leave no narrative behind.
async fn escalate_mid_draft(
    engine: &Arc<CaseEngine>,
    id: &CaseId,
    analyst: &Actor,
    text: bool,
) -> anyhow::Result<()> {
    let runner = tokio::spawn({
        let engine = Arc::clone(engine);
        let id = id.clone();
        async move { engine.start_narrative(&id).await }
    });

    let mut drafting = false;
    for _ in 0..500 {
        let status = engine.pipeline_status(id).await?;
        if status.stage == PipelineStage::Drafting && status.in_flight {
            drafting = true;
            break;
        }
        if runner.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    if !drafting {
        bail!("drafting finished before it could be interrupted; raise --draft-delay-ms");
    }

    let case = engine.escalate(id, analyst).await?;
    step(text, "Escalated mid-draft", &case);

    match runner.await? {
        Ok(_) => bail!("cancelled narrative run completed"),
        Err(err) => {
            if text {
                println!("  {} {}", "run discarded:".dimmed(), err);
            }
        }
    }
    Ok(())
}

fn print_header(case: &Case) {
    println!(
        "{} {}  {} ({})",
        "Case".bold(),
        case.id.to_string().yellow().bold(),
        case.customer.name.bold(),
        case.customer.id
    );
    println!(
        "  Risk: {} ({})  Opened: {}  Transactions: {}",
        case.risk_score,
        case.risk_level(),
        case.opened_on,
        case.transactions.len()
    );
    for typology in &case.typologies {
        println!(
            "  {} {} {:.0}%",
            typology.id.to_string().cyan(),
            typology.name,
            typology.confidence * 100.0
        );
    }
    println!();
}

fn step(text: bool, label: &str, case: &Case) {
    if text {
        println!("{} {:<20} {}", "✓".green(), label, colored_status(case.status));
    }
}

fn colored_status(status: CaseStatus) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        CaseStatus::Filed | CaseStatus::ReadyForFiling => label.green().bold(),
        CaseStatus::Escalated => label.red().bold(),
        CaseStatus::QaPending => label.yellow(),
        _ => label.normal(),
    }
}

async fn print_narrative(engine: &CaseEngine, case: &Case) -> anyhow::Result<()> {
    let Some(narrative) = &case.narrative else {
        println!("\n{}", "No narrative on record.".dimmed());
        return Ok(());
    };

    println!("\n{}", "Narrative".bold().underline());
    for section in &narrative.sections {
        println!("\n{}", section.title.bold());
        println!("{}", section.body);
    }

    println!("\n{}", "Citations".bold().underline());
    for tx in case.transactions.iter().filter(|t| t.flagged) {
        let sections = engine.citations_for(&case.id, &tx.id).await?;
        let cited = if sections.is_empty() {
            "-".dimmed().to_string()
        } else {
            sections
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  {:<10} {}", tx.id.to_string().yellow(), cited);
    }
    Ok(())
}

fn print_audit(audit: &[AuditEvent], chain_valid: bool) {
    println!("\n{}", "Audit trail".bold().underline());
    for event in audit {
        println!(
            "  {:>2} {} {} {:<16} {}",
            event.seq,
            event.hash.short_hex().dimmed(),
            event.timestamp.format("%H:%M:%S%.3f"),
            event.actor.to_string().cyan(),
            event.action.to_string().bold()
        );
        if !event.detail.is_empty() {
            println!("       {}", event.detail.dimmed());
        }
    }
    let verdict = if chain_valid {
        "✓ chain intact".green().bold()
    } else {
        "✗ chain broken".red().bold()
    };
    println!("\n{verdict} ({} entries)", audit.len());
}
