use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a case's narrative pipeline.
///
/// Stages run strictly in declaration order. `Complete` ends automatic
/// progression; `FactChecking` and `Verified` are reached only through an
/// explicit fact-check run.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Retrieving,
    Analyzing,
    Drafting,
    Complete,
    FactChecking,
    Verified,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        Self::Idle,
        Self::Retrieving,
        Self::Analyzing,
        Self::Drafting,
        Self::Complete,
        Self::FactChecking,
        Self::Verified,
    ];

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Retrieving),
            Self::Retrieving => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Drafting),
            Self::Drafting => Some(Self::Complete),
            Self::Complete => Some(Self::FactChecking),
            Self::FactChecking => Some(Self::Verified),
            Self::Verified => None,
        }
    }

    /// Stages that delegate to an external collaborator.
    pub fn is_delegating(&self) -> bool {
        matches!(
            self,
            Self::Retrieving | Self::Analyzing | Self::Drafting | Self::FactChecking
        )
    }

    /// Generation stages between `Idle` and `Complete`.
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Retrieving | Self::Analyzing | Self::Drafting)
    }

    /// A narrative exists at this stage.
    pub fn has_narrative(&self) -> bool {
        matches!(self, Self::Complete | Self::FactChecking | Self::Verified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Analyzing => "analyzing",
            Self::Drafting => "drafting",
            Self::Complete => "complete",
            Self::FactChecking => "fact_checking",
            Self::Verified => "verified",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
