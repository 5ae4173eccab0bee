//! Built-in pipeline collaborators.

pub mod detection;
pub mod drafting;
pub mod fact_check;

pub use detection::RuleBasedDetector;
pub use drafting::TemplateGenerator;
pub use fact_check::EvidenceFactChecker;
