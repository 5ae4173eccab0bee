use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{TransactionId, TypologyId};

/// A detected suspicious-activity pattern and the evidence behind it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Typology {
    pub id: TypologyId,
    pub name: String,
    pub description: String,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    /// Transactions that exhibit the pattern. Every id must exist in the
    /// owning case.
    pub related_transactions: Vec<TransactionId>,
    /// Discrete evidentiary claims, each defensible on its own.
    pub rationale: Vec<String>,
}

impl Typology {
    /// Reject confidences outside `[0, 1]` (including NaN).
    pub fn validate(&self) -> Result<(), TypeError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(TypeError::ConfidenceOutOfRange {
                typology: self.id.to_string(),
                value: self.confidence.to_string(),
            });
        }
        Ok(())
    }

    /// Confidence as a whole percentage, e.g. `98`.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}
