use std::time::Duration;

use sar_audit::AuditError;
use sar_evidence::EvidenceError;
use sar_index::IndexError;
use sar_pipeline::{Discrepancy, PipelineError, PipelineStage};
use sar_types::{CaseId, SectionId, TransactionId};
use thiserror::Error;

/// Errors returned by engine commands and queries.
///
/// A command that returns an error has not changed the case. Integrity
/// failures on an existing case are also written to its audit log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("case already exists: {0}")]
    CaseExists(CaseId),

    #[error("transaction {transaction} not found in case {case}")]
    TransactionNotFound {
        case: CaseId,
        transaction: TransactionId,
    },

    #[error("section {section} not found in case {case}")]
    SectionNotFound { case: CaseId, section: SectionId },

    /// A transition was attempted while its precondition does not hold.
    #[error("guard violation: {condition}")]
    GuardViolation { condition: String },

    #[error("pipeline busy: a run is in flight at stage {stage}")]
    PipelineBusy { stage: PipelineStage },

    #[error("verification failed: {} discrepancies", discrepancies.len())]
    VerificationFailure { discrepancies: Vec<Discrepancy> },

    #[error("dangling reference: {referrer} cites unknown transaction {transaction}")]
    DanglingReference {
        referrer: String,
        transaction: TransactionId,
    },

    #[error("stage {stage} timed out after {after:?}")]
    StageTimeout {
        stage: PipelineStage,
        after: Duration,
    },

    /// The case's audit log failed verification and refuses writes.
    #[error("audit chain integrity failure for case {case}: {reason}")]
    ChainIntegrity { case: CaseId, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{collaborator} failed during {stage}: {message}")]
    Collaborator {
        stage: PipelineStage,
        collaborator: String,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn guard(condition: impl Into<String>) -> Self {
        Self::GuardViolation {
            condition: condition.into(),
        }
    }

    /// Data-integrity failures that must also land in the audit trail.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::DanglingReference { .. } | Self::ChainIntegrity { .. })
    }

    /// Failures a caller can retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PipelineBusy { .. } | Self::StageTimeout { .. })
    }
}

impl From<PipelineError> for EngineError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Busy { stage } => Self::PipelineBusy { stage },
            PipelineError::InvalidStage { action, stage } => Self::GuardViolation {
                condition: format!("cannot {action} while the pipeline is at stage {stage}"),
            },
            PipelineError::StaleRun { stage } => Self::GuardViolation {
                condition: format!("the {stage} run was cancelled"),
            },
            PipelineError::StageTimeout { stage, after } => Self::StageTimeout { stage, after },
            PipelineError::InvalidTypology { typology, reason } => {
                Self::InvalidInput(format!("typology {typology}: {reason}"))
            }
            PipelineError::Collaborator {
                stage,
                collaborator,
                message,
            } => Self::Collaborator {
                stage,
                collaborator,
                message,
            },
            PipelineError::Index(e) => e.into(),
            PipelineError::Evidence(e) => e.into(),
        }
    }
}

impl From<IndexError> for EngineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DanglingReference {
                referrer,
                transaction,
            } => Self::DanglingReference {
                referrer: referrer.to_string(),
                transaction,
            },
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

impl From<EvidenceError> for EngineError {
    fn from(err: EvidenceError) -> Self {
        match err {
            EvidenceError::UnknownCase(case) => Self::CaseNotFound(case),
            EvidenceError::UnknownSuperseded { id, .. } => Self::DanglingReference {
                referrer: "correction".into(),
                transaction: id,
            },
            EvidenceError::DuplicateTransaction { .. } | EvidenceError::MissingSupersedes(_) => {
                Self::InvalidInput(err.to_string())
            }
            EvidenceError::LockPoisoned | EvidenceError::Backend(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AuditError> for EngineError {
    fn from(err: AuditError) -> Self {
        let reason = err.to_string();
        match err {
            AuditError::ChainIntegrity { case, .. } | AuditError::Sealed { case, .. } => {
                Self::ChainIntegrity { case, reason }
            }
            AuditError::Serialization(_) | AuditError::LockPoisoned => Self::Internal(reason),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
