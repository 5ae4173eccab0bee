use std::sync::Arc;

use chrono::NaiveDate;
use sar_audit::InMemoryAuditLog;
use sar_index::CrossReferenceIndex;
use sar_pipeline::StageTracker;
use sar_types::{Case, NarrativeSection, Transaction};
use tokio::sync::Mutex;

/// Everything the engine holds for one case.
///
/// `record` is the unit of mutual exclusion for commands. The audit log sits
/// beside it so log reads never wait behind a command.
pub(crate) struct CaseSlot {
    pub record: Mutex<CaseRecord>,
    pub audit: Arc<InMemoryAuditLog>,
    /// Creation order across the engine, for newest-first listings.
    pub ordinal: u64,
}

impl CaseSlot {
    pub fn new(record: CaseRecord, audit: InMemoryAuditLog, ordinal: u64) -> Self {
        Self {
            record: Mutex::new(record),
            audit: Arc::new(audit),
            ordinal,
        }
    }
}

/// Mutable state of a case, guarded by [`CaseSlot::record`].
pub(crate) struct CaseRecord {
    pub case: Case,
    pub tracker: StageTracker,
    /// Transactions read by the current run's `retrieving` stage.
    pub retrieved: Vec<Transaction>,
    pub index: CrossReferenceIndex,
    pub filed_on: Option<NaiveDate>,
}

impl CaseRecord {
    pub fn new(case: Case, index: CrossReferenceIndex) -> Self {
        Self {
            case,
            tracker: StageTracker::new(),
            retrieved: Vec::new(),
            index,
            filed_on: None,
        }
    }

    pub fn sections(&self) -> &[NarrativeSection] {
        self.case
            .narrative
            .as_ref()
            .map(|n| n.sections.as_slice())
            .unwrap_or_default()
    }
}
