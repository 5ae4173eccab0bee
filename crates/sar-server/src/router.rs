use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use sar_engine::CaseEngine;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Build the `/v1` API over a shared engine.
pub fn build_router(engine: Arc<CaseEngine>) -> Router {
    let cases = Router::new()
        .route("/", post(handler::create_case))
        .route("/active", get(handler::active_cases))
        .route("/:id", get(handler::get_case))
        .route("/:id/audit", get(handler::audit_log))
        .route("/:id/audit/verify", get(handler::verify_audit))
        .route("/:id/pipeline", get(handler::pipeline_status))
        .route("/:id/citations/:tx", get(handler::citations))
        .route("/:id/report", get(handler::report))
        .route("/:id/assign", post(handler::assign))
        .route("/:id/narrative", post(handler::start_narrative))
        .route("/:id/narrative/reset", post(handler::reset_narrative))
        .route(
            "/:id/narrative/sections/:section",
            put(handler::edit_section),
        )
        .route("/:id/fact-check", post(handler::fact_check))
        .route("/:id/escalate", post(handler::escalate))
        .route("/:id/submit", post(handler::submit))
        .route("/:id/file", post(handler::file))
        .route("/:id/corrections", post(handler::correct_transaction));

    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/dashboard", get(handler::dashboard))
        .nest("/v1/cases", cases)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}
