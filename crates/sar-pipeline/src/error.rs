use std::time::Duration;

use sar_evidence::EvidenceError;
use sar_index::IndexError;
use sar_types::TypologyId;

use crate::stage::PipelineStage;

/// Errors produced by the narrative pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// A run is already in flight for this case.
    #[error("pipeline busy: a run is in flight at stage {stage}")]
    Busy { stage: PipelineStage },

    /// The requested operation is not valid at the current stage.
    #[error("cannot {action} while the pipeline is at stage {stage}")]
    InvalidStage {
        action: &'static str,
        stage: PipelineStage,
    },

    /// The run ticket was invalidated (cancelled or superseded).
    #[error("run at stage {stage} is no longer current")]
    StaleRun { stage: PipelineStage },

    #[error("stage {stage} timed out after {after:?}")]
    StageTimeout {
        stage: PipelineStage,
        after: Duration,
    },

    #[error("typology {typology} rejected: {reason}")]
    InvalidTypology { typology: TypologyId, reason: String },

    /// A collaborator failed for its own reasons.
    #[error("{collaborator} failed during {stage}: {message}")]
    Collaborator {
        stage: PipelineStage,
        collaborator: String,
        message: String,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),
}

impl PipelineError {
    pub fn collaborator(
        stage: PipelineStage,
        collaborator: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Collaborator {
            stage,
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Failures a caller can retry without changing any input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::StageTimeout { .. })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
