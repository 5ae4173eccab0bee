use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::stage::PipelineStage;

/// Proof that the holder owns the current pipeline run.
///
/// Tickets are issued by [`StageTracker::start_generation`] and
/// [`StageTracker::start_fact_check`]. Cancelling bumps the tracker's epoch,
/// which invalidates every outstanding ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunTicket {
    epoch: u64,
    run: u64,
}

/// A granted run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunStart {
    pub ticket: RunTicket,
    /// The stage the tracker moved into, or `None` when a stalled run is
    /// resumed at its current stage.
    pub entered: Option<PipelineStage>,
}

/// Read view of a case's pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub stage: PipelineStage,
    pub in_flight: bool,
}

/// Stage bookkeeping for one case's narrative pipeline.
///
/// The tracker holds no collaborator results; it only decides which stage
/// transitions are legal and which run may apply them. At most one run is
/// in flight at a time. A run that fails or times out is released without
/// moving the stage, leaving the pipeline stalled at that stage; the next
/// start resumes it there.
#[derive(Clone, Debug, Default)]
pub struct StageTracker {
    stage: PipelineStage,
    epoch: u64,
    runs: u64,
    in_flight: Option<RunTicket>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            stage: self.stage,
            in_flight: self.is_in_flight(),
        }
    }

    /// Begin or resume narrative generation.
    pub fn start_generation(&mut self) -> PipelineResult<RunStart> {
        self.ensure_idle_slot()?;
        let entered = match self.stage {
            PipelineStage::Idle => {
                self.stage = PipelineStage::Retrieving;
                Some(self.stage)
            }
            stage if stage.is_generating() => None,
            stage => {
                return Err(PipelineError::InvalidStage {
                    action: "start generation",
                    stage,
                })
            }
        };
        Ok(self.grant(entered))
    }

    /// Begin or resume fact checking of a completed narrative.
    pub fn start_fact_check(&mut self) -> PipelineResult<RunStart> {
        self.ensure_idle_slot()?;
        let entered = match self.stage {
            PipelineStage::Complete => {
                self.stage = PipelineStage::FactChecking;
                Some(self.stage)
            }
            PipelineStage::FactChecking => None,
            stage => {
                return Err(PipelineError::InvalidStage {
                    action: "run fact check",
                    stage,
                })
            }
        };
        Ok(self.grant(entered))
    }

    /// Whether `ticket` still owns the pipeline.
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        self.in_flight.as_ref() == Some(ticket) && ticket.epoch == self.epoch
    }

    /// Move to the next stage on behalf of the current run.
    ///
    /// Reaching `Complete` or `Verified` ends the run.
    pub fn advance(&mut self, ticket: &RunTicket, to: PipelineStage) -> PipelineResult<()> {
        self.ensure_current(ticket)?;
        if self.stage.next() != Some(to) || self.stage == PipelineStage::Complete {
            return Err(PipelineError::InvalidStage {
                action: "advance",
                stage: self.stage,
            });
        }
        self.stage = to;
        if matches!(to, PipelineStage::Complete | PipelineStage::Verified) {
            self.in_flight = None;
        }
        Ok(())
    }

    /// Fact checking found discrepancies: fall back to `Complete`.
    pub fn reject_verification(&mut self, ticket: &RunTicket) -> PipelineResult<()> {
        self.ensure_current(ticket)?;
        if self.stage != PipelineStage::FactChecking {
            return Err(PipelineError::InvalidStage {
                action: "reject verification",
                stage: self.stage,
            });
        }
        self.stage = PipelineStage::Complete;
        self.in_flight = None;
        Ok(())
    }

    /// End the current run without moving the stage. No-op for a stale
    /// ticket.
    pub fn release(&mut self, ticket: &RunTicket) {
        if self.is_current(ticket) {
            self.in_flight = None;
        }
    }

    /// Invalidate any outstanding run. Returns whether one was in flight.
    pub fn cancel(&mut self) -> bool {
        self.epoch += 1;
        self.in_flight.take().is_some()
    }

    /// Return to `Idle` from `Complete` or `Verified`.
    pub fn reset(&mut self) -> PipelineResult<()> {
        self.ensure_idle_slot()?;
        match self.stage {
            PipelineStage::Complete | PipelineStage::Verified => {
                self.stage = PipelineStage::Idle;
                Ok(())
            }
            stage => Err(PipelineError::InvalidStage {
                action: "reset",
                stage,
            }),
        }
    }

    fn ensure_idle_slot(&self) -> PipelineResult<()> {
        if self.in_flight.is_some() {
            return Err(PipelineError::Busy { stage: self.stage });
        }
        Ok(())
    }

    fn ensure_current(&self, ticket: &RunTicket) -> PipelineResult<()> {
        if !self.is_current(ticket) {
            return Err(PipelineError::StaleRun { stage: self.stage });
        }
        Ok(())
    }

    fn grant(&mut self, entered: Option<PipelineStage>) -> RunStart {
        self.runs += 1;
        let ticket = RunTicket {
            epoch: self.epoch,
            run: self.runs,
        };
        self.in_flight = Some(ticket);
        RunStart { ticket, entered }
    }
}
