use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sar_audit::AuditEvent;
use sar_engine::{CaseEngine, DashboardMetrics, NewCase, SarReport};
use sar_pipeline::PipelineStatus;
use sar_types::{Case, CaseId, CaseSummary, SectionId, Transaction, TransactionId, TypologyId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::actor::RequestActor;
use crate::error::ApiResult;

type Engine = State<Arc<CaseEngine>>;

/// GET /v1/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /v1/dashboard
pub async fn dashboard(State(engine): Engine) -> ApiResult<Json<DashboardMetrics>> {
    Ok(Json(engine.dashboard_metrics().await?))
}

/// GET /v1/cases/active
pub async fn active_cases(State(engine): Engine) -> ApiResult<Json<Vec<CaseSummary>>> {
    Ok(Json(engine.active_cases().await?))
}

/// POST /v1/cases
pub async fn create_case(
    State(engine): Engine,
    Json(new): Json<NewCase>,
) -> ApiResult<(StatusCode, Json<Case>)> {
    let case = engine.create_case(new).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

/// GET /v1/cases/:id
pub async fn get_case(State(engine): Engine, Path(id): Path<CaseId>) -> ApiResult<Json<Case>> {
    Ok(Json(engine.get_case(&id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// Only the most recent `tail` entries.
    pub tail: Option<usize>,
}

/// GET /v1/cases/:id/audit
pub async fn audit_log(
    State(engine): Engine,
    Path(id): Path<CaseId>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    let events = match query.tail {
        Some(n) => engine.audit_tail(&id, n)?,
        None => engine.get_audit_log(&id)?,
    };
    Ok(Json(events))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainVerdict {
    pub case_id: CaseId,
    pub valid: bool,
}

/// GET /v1/cases/:id/audit/verify
pub async fn verify_audit(
    State(engine): Engine,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<ChainVerdict>> {
    let valid = engine.verify_audit_chain(&id)?;
    Ok(Json(ChainVerdict { case_id: id, valid }))
}

/// GET /v1/cases/:id/pipeline
pub async fn pipeline_status(
    State(engine): Engine,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<PipelineStatus>> {
    Ok(Json(engine.pipeline_status(&id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitationView {
    pub transaction: TransactionId,
    pub sections: Vec<SectionId>,
    pub typologies: Vec<TypologyId>,
}

/// GET /v1/cases/:id/citations/:tx
pub async fn citations(
    State(engine): Engine,
    Path((id, transaction)): Path<(CaseId, TransactionId)>,
) -> ApiResult<Json<CitationView>> {
    let sections = engine.citations_for(&id, &transaction).await?;
    let typologies = engine.typologies_for(&id, &transaction).await?;
    Ok(Json(CitationView {
        transaction,
        sections,
        typologies,
    }))
}

/// GET /v1/cases/:id/report
pub async fn report(State(engine): Engine, Path(id): Path<CaseId>) -> ApiResult<Json<SarReport>> {
    Ok(Json(engine.sar_report(&id).await?))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// POST /v1/cases/:id/assign
pub async fn assign(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.assign(&id, &actor).await?))
}

/// POST /v1/cases/:id/narrative
pub async fn start_narrative(
    State(engine): Engine,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.start_narrative(&id).await?))
}

/// POST /v1/cases/:id/fact-check
pub async fn fact_check(State(engine): Engine, Path(id): Path<CaseId>) -> ApiResult<Json<Case>> {
    Ok(Json(engine.run_fact_check(&id).await?))
}

/// POST /v1/cases/:id/escalate
pub async fn escalate(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.escalate(&id, &actor).await?))
}

/// POST /v1/cases/:id/submit
pub async fn submit(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.submit_for_filing(&id, &actor).await?))
}

/// POST /v1/cases/:id/file
pub async fn file(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.file(&id, &actor).await?))
}

/// POST /v1/cases/:id/narrative/reset
pub async fn reset_narrative(
    State(engine): Engine,
    Path(id): Path<CaseId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(engine.reset_narrative(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SectionEdit {
    pub body: String,
    #[serde(default)]
    pub citations: Vec<TransactionId>,
}

/// PUT /v1/cases/:id/narrative/sections/:section
pub async fn edit_section(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path((id, section)): Path<(CaseId, SectionId)>,
    Json(edit): Json<SectionEdit>,
) -> ApiResult<Json<Case>> {
    let case = engine
        .edit_section(&id, &actor, &section, edit.body, edit.citations)
        .await?;
    Ok(Json(case))
}

#[derive(Debug, Deserialize)]
pub struct Correction {
    pub supersedes: TransactionId,
    pub transaction: Transaction,
}

/// POST /v1/cases/:id/corrections
pub async fn correct_transaction(
    State(engine): Engine,
    RequestActor(actor): RequestActor,
    Path(id): Path<CaseId>,
    Json(correction): Json<Correction>,
) -> ApiResult<Json<Case>> {
    let case = engine
        .correct_transaction(&id, &actor, correction.transaction, correction.supersedes)
        .await?;
    Ok(Json(case))
}
