use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sar_crypto::{ChainLink, Digest};
use sar_types::{Actor, CaseId, EventId};

/// What happened. The display form is the human-readable action tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    CaseCreated,
    DataIngestion,
    TypologyScan,
    CaseAssignment,
    /// A narrative pipeline stage was entered; carries the stage name.
    PipelineStage(String),
    VerificationFailure,
    NarrativeEdited,
    NarrativeReset,
    Escalation,
    SarApproved,
    SarFiled,
    EvidenceCorrection,
    /// A data-integrity error surfaced to a caller.
    IntegrityViolation,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaseCreated => f.write_str("Case Created"),
            Self::DataIngestion => f.write_str("Data Ingestion"),
            Self::TypologyScan => f.write_str("Typology Scan"),
            Self::CaseAssignment => f.write_str("Case Assignment"),
            Self::PipelineStage(stage) => write!(f, "Pipeline Stage: {stage}"),
            Self::VerificationFailure => f.write_str("Verification Failure"),
            Self::NarrativeEdited => f.write_str("Narrative Edited"),
            Self::NarrativeReset => f.write_str("Narrative Reset"),
            Self::Escalation => f.write_str("Escalation"),
            Self::SarApproved => f.write_str("SAR Approved"),
            Self::SarFiled => f.write_str("SAR Filed"),
            Self::EvidenceCorrection => f.write_str("Evidence Correction"),
            Self::IntegrityViolation => f.write_str("Integrity Violation"),
        }
    }
}

/// One immutable audit log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: EventId,
    pub case_id: CaseId,
    /// 1-based position in the case's log.
    pub seq: u64,
    /// Non-decreasing within a case.
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: AuditAction,
    pub detail: String,
    pub prev_hash: Option<Digest>,
    /// `hash(prev_hash ‖ canonical payload)`.
    pub hash: Digest,
}

/// Canonical hashed payload: every field except the two hash fields.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    id: &'a EventId,
    case_id: &'a CaseId,
    seq: u64,
    timestamp: &'a DateTime<Utc>,
    actor: &'a Actor,
    action: &'a AuditAction,
    detail: &'a str,
}

impl AuditEvent {
    /// Serialized form the chain hash covers.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CanonicalPayload {
            id: &self.id,
            case_id: &self.case_id,
            seq: self.seq,
            timestamp: &self.timestamp,
            actor: &self.actor,
            action: &self.action,
            detail: &self.detail,
        })
    }
}

impl ChainLink for AuditEvent {
    fn link_hash(&self) -> Digest {
        self.hash
    }

    fn prev_hash(&self) -> Option<Digest> {
        self.prev_hash
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.canonical_bytes().unwrap_or_default()
    }
}
