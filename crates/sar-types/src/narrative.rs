use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{SectionId, TransactionId};

/// One section of a generated SAR narrative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub id: SectionId,
    pub title: String,
    pub body: String,
    /// Transactions cited by the body, in order of appearance.
    pub citations: Vec<TransactionId>,
}

/// The narrative attached to a case: an ordered list of sections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub sections: Vec<NarrativeSection>,
    pub generated_at: DateTime<Utc>,
}

impl Narrative {
    pub fn new(sections: Vec<NarrativeSection>) -> Self {
        Self {
            sections,
            generated_at: Utc::now(),
        }
    }

    pub fn section(&self, id: &SectionId) -> Option<&NarrativeSection> {
        self.sections.iter().find(|s| &s.id == id)
    }

    /// Total number of citations across all sections.
    pub fn citation_count(&self) -> usize {
        self.sections.iter().map(|s| s.citations.len()).sum()
    }
}
