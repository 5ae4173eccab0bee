//! Case status transition graph.
//!
//! ```text
//! Open -> In Review -> Drafting -> QA Pending -> Ready for Filing -> Filed
//!   \________\____________\___________\-> Escalated
//! ```
//!
//! While unlocked, the investigation-track statuses are a projection of
//! pipeline progress and only ever move forward.

use sar_pipeline::PipelineStage;
use sar_types::CaseStatus;

use crate::error::{EngineError, EngineResult};

pub fn allowed_transitions(from: CaseStatus) -> Vec<CaseStatus> {
    use CaseStatus::*;
    match from {
        Open => vec![InReview, Drafting, QaPending, Escalated],
        InReview => vec![Drafting, QaPending, Escalated],
        Drafting => vec![QaPending, Escalated],
        QaPending => vec![ReadyForFiling, Escalated],
        ReadyForFiling => vec![Filed],
        Escalated => vec![],
        Filed => vec![],
    }
}

/// Check `from -> to` against the graph.
pub fn validate_transition(from: CaseStatus, to: CaseStatus) -> EngineResult<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EngineError::guard(format!(
            "transition from {from} to {to} is not allowed"
        )))
    }
}

/// The status a case moves to when its pipeline enters `stage`, if any.
///
/// Returns `None` for locked or terminal cases and whenever the projection
/// would not move the case forward. `fact_checking` projects nothing: a
/// check can still fall back to `complete`, so QA Pending waits for
/// `verified`.
pub fn projected_status(current: CaseStatus, stage: PipelineStage) -> Option<CaseStatus> {
    let current_rank = current.progress_rank()?;
    let target = match stage {
        PipelineStage::Idle | PipelineStage::FactChecking => return None,
        PipelineStage::Retrieving | PipelineStage::Analyzing => CaseStatus::InReview,
        PipelineStage::Drafting | PipelineStage::Complete => CaseStatus::Drafting,
        PipelineStage::Verified => CaseStatus::QaPending,
    };
    match target.progress_rank() {
        Some(rank) if rank > current_rank => Some(target),
        _ => None,
    }
}

/// Guard shared by every command that touches the narrative.
pub fn ensure_unlocked(status: CaseStatus) -> EngineResult<()> {
    if status.is_locked() || status.is_terminal() {
        Err(EngineError::guard(format!(
            "case is {status}; the narrative is frozen"
        )))
    } else {
        Ok(())
    }
}
