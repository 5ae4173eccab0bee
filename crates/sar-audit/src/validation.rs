use sar_crypto::{ChainLink, ContentHasher, HashChainVerifier};
use sar_types::CaseId;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::traits::AuditReader;

pub(crate) const VERIFIER: HashChainVerifier = HashChainVerifier::new(ContentHasher::AUDIT_EVENT);

/// Result of validating a case's audit stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub case_id: CaseId,
    pub event_count: u64,
    pub hash_chain_valid: bool,
    pub sequence_monotonic: bool,
    pub timestamps_monotonic: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The first violation, if any.
    pub fn first_violation(&self) -> Option<&Violation> {
        self.violations.first()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    TimestampRegression,
    ForeignCase,
}

/// Audit stream integrity validator.
///
/// Unlike the fail-fast [`HashChainVerifier`], the validator walks the whole
/// stream and reports every violation it finds.
pub struct ChainValidator;

impl ChainValidator {
    pub fn validate<R: AuditReader + ?Sized>(reader: &R) -> Result<ValidationReport, AuditError> {
        let events = reader.events()?;
        Ok(Self::validate_events(reader.case_id(), &events))
    }

    pub fn validate_events(case_id: &CaseId, events: &[AuditEvent]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut hash_chain_valid = true;
        let mut sequence_monotonic = true;
        let mut timestamps_monotonic = true;

        for (index, event) in events.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if event.seq != expected_seq {
                sequence_monotonic = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", event.seq),
                });
            }

            if &event.case_id != case_id {
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::ForeignCase,
                    description: format!("event belongs to case {}", event.case_id),
                });
            }

            let prev = index.checked_sub(1).map(|i| &events[i]);
            let expected_prev = prev.map(|p| p.hash);
            if event.prev_hash != expected_prev {
                hash_chain_valid = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            let computed = VERIFIER.compute_hash(&event.payload_bytes(), expected_prev.as_ref());
            if computed != event.hash {
                hash_chain_valid = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::HashMismatch,
                    description: "event hash does not match computed".into(),
                });
            }

            if let Some(prev) = prev {
                if event.timestamp < prev.timestamp {
                    timestamps_monotonic = false;
                    violations.push(Violation {
                        seq: event.seq,
                        kind: ViolationKind::TimestampRegression,
                        description: format!(
                            "timestamp {} precedes previous {}",
                            event.timestamp, prev.timestamp
                        ),
                    });
                }
            }
        }

        ValidationReport {
            case_id: case_id.clone(),
            event_count: events.len() as u64,
            hash_chain_valid,
            sequence_monotonic,
            timestamps_monotonic,
            violations,
        }
    }
}
