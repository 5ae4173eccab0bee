use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sar_engine::EngineError;
use sar_pipeline::Discrepancy;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// An engine error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    discrepancies: Option<Vec<Discrepancy>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::CaseNotFound(_)
            | EngineError::TransactionNotFound { .. }
            | EngineError::SectionNotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::CaseExists(_)
            | EngineError::GuardViolation { .. }
            | EngineError::PipelineBusy { .. }
            | EngineError::VerificationFailure { .. } => StatusCode::CONFLICT,
            EngineError::DanglingReference { .. } | EngineError::InvalidInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::StageTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
            EngineError::ChainIntegrity { .. }
            | EngineError::Config(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match &self.0 {
            EngineError::CaseNotFound(_) => "case_not_found",
            EngineError::CaseExists(_) => "case_exists",
            EngineError::TransactionNotFound { .. } => "transaction_not_found",
            EngineError::SectionNotFound { .. } => "section_not_found",
            EngineError::GuardViolation { .. } => "guard_violation",
            EngineError::PipelineBusy { .. } => "pipeline_busy",
            EngineError::VerificationFailure { .. } => "verification_failure",
            EngineError::DanglingReference { .. } => "dangling_reference",
            EngineError::StageTimeout { .. } => "stage_timeout",
            EngineError::ChainIntegrity { .. } => "chain_integrity",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Collaborator { .. } => "collaborator_failure",
            EngineError::Config(_) => "config",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        let discrepancies = match &self.0 {
            EngineError::VerificationFailure { discrepancies } => Some(discrepancies.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            message: self.0.to_string(),
            discrepancies,
        };
        (status, Json(body)).into_response()
    }
}
