//! Narrative pipeline for SAR investigation cases.
//!
//! A case's narrative is produced by a strictly ordered sequence of stages:
//!
//! ```text
//! idle -> retrieving -> analyzing -> drafting -> complete -> fact_checking -> verified
//! ```
//!
//! This crate splits the pipeline in two:
//! - [`StageTracker`] decides which transitions are legal and which run may
//!   apply them (run tickets, cancellation, reset).
//! - [`NarrativePipeline`] performs each stage's delegation to an external
//!   collaborator under a timeout and validates the result.
//!
//! Collaborators are trait objects ([`TypologyDetector`],
//! [`NarrativeGenerator`], [`FactChecker`]). Built-in implementations live
//! in [`stages`].

pub mod collaborator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod tracker;

// Re-exports for convenience.
pub use collaborator::{Discrepancy, DraftContext, FactChecker, NarrativeGenerator, TypologyDetector};
pub use config::{DetectionConfig, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Draft, NarrativePipeline};
pub use stage::PipelineStage;
pub use stages::{EvidenceFactChecker, RuleBasedDetector, TemplateGenerator};
pub use tracker::{PipelineStatus, RunStart, RunTicket, StageTracker};
