use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use sar_crypto::{ChainLink, Digest};
use sar_types::{Actor, CaseId, EventId};

use crate::error::AuditError;
use crate::event::{AuditAction, AuditEvent};
use crate::traits::{AuditReader, AuditWriter};
use crate::validation::{ChainValidator, VERIFIER};

/// In-memory audit log for a single case.
///
/// Appends take the write lock for the whole read-link-hash-push sequence,
/// so appends are linearizable and the chain can never fork. Readers never
/// wait behind the case's command lock, only behind an in-progress append.
pub struct InMemoryAuditLog {
    case_id: CaseId,
    inner: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    events: Vec<AuditEvent>,
    sealed: Option<String>,
}

impl InMemoryAuditLog {
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            inner: RwLock::new(LogState::default()),
        }
    }

    /// Recompute the whole chain from the first event.
    ///
    /// A failed verification seals the log: every later append returns
    /// [`AuditError::Sealed`] until the case is investigated.
    pub fn verify_chain(&self) -> Result<bool, AuditError> {
        let mut state = self.write_state()?;
        let report = ChainValidator::validate_events(&self.case_id, &state.events);
        if let Some(violation) = report.first_violation() {
            let reason = format!("seq {}: {}", violation.seq, violation.description);
            tracing::warn!(case = %self.case_id, %reason, "audit chain verification failed");
            state.sealed.get_or_insert(reason);
            return Ok(false);
        }
        Ok(true)
    }

    /// Why the log was sealed, if it was.
    pub fn sealed_reason(&self) -> Result<Option<String>, AuditError> {
        Ok(self.read_state()?.sealed.clone())
    }

    pub fn is_sealed(&self) -> Result<bool, AuditError> {
        Ok(self.read_state()?.sealed.is_some())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LogState>, AuditError> {
        self.inner.read().map_err(|_| AuditError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LogState>, AuditError> {
        self.inner.write().map_err(|_| AuditError::LockPoisoned)
    }

    /// Check that the current head still hashes to what it claims before
    /// linking a new event to it.
    fn check_head(&self, state: &LogState) -> Result<Option<Digest>, AuditError> {
        let Some(head) = state.events.last() else {
            return Ok(None);
        };
        let prev = state
            .events
            .len()
            .checked_sub(2)
            .map(|i| state.events[i].hash);
        if head.prev_hash != prev
            || VERIFIER.compute_hash(&head.payload_bytes(), prev.as_ref()) != head.hash
        {
            return Err(AuditError::ChainIntegrity {
                case: self.case_id.clone(),
                seq: head.seq,
                reason: "head event no longer matches its hash".into(),
            });
        }
        Ok(Some(head.hash))
    }
}

impl AuditWriter for InMemoryAuditLog {
    fn append(
        &self,
        actor: &Actor,
        action: AuditAction,
        detail: &str,
    ) -> Result<AuditEvent, AuditError> {
        let mut state = self.write_state()?;

        if let Some(reason) = &state.sealed {
            return Err(AuditError::Sealed {
                case: self.case_id.clone(),
                reason: reason.clone(),
            });
        }

        let prev_hash = match self.check_head(&state) {
            Ok(prev) => prev,
            Err(err) => {
                tracing::warn!(case = %self.case_id, error = %err, "sealing audit log");
                state.sealed = Some(err.to_string());
                return Err(err);
            }
        };

        let now = Utc::now();
        let timestamp = match state.events.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let mut event = AuditEvent {
            id: EventId::new(),
            case_id: self.case_id.clone(),
            seq: state.events.len() as u64 + 1,
            timestamp,
            actor: actor.clone(),
            action,
            detail: detail.to_string(),
            prev_hash,
            hash: Digest::ZERO,
        };
        let payload = event
            .canonical_bytes()
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        event.hash = VERIFIER.compute_hash(&payload, prev_hash.as_ref());

        tracing::debug!(
            case = %self.case_id,
            seq = event.seq,
            action = %event.action,
            hash = %event.hash.short_hex(),
            "audit event appended"
        );
        state.events.push(event.clone());
        Ok(event)
    }
}

impl AuditReader for InMemoryAuditLog {
    fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self.read_state()?.events.clone())
    }

    fn tail(&self, n: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let state = self.read_state()?;
        let start = state.events.len().saturating_sub(n);
        Ok(state.events[start..].to_vec())
    }

    fn head(&self) -> Result<Option<AuditEvent>, AuditError> {
        Ok(self.read_state()?.events.last().cloned())
    }

    fn len(&self) -> Result<u64, AuditError> {
        Ok(self.read_state()?.events.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn log() -> InMemoryAuditLog {
        InMemoryAuditLog::new("SAR-2023-001".into())
    }

    #[test]
    fn append_links_events() {
        let log = log();
        let first = log
            .append(&Actor::System, AuditAction::CaseCreated, "created")
            .unwrap();
        let second = log
            .append(&Actor::user("Sarah Jenkins"), AuditAction::CaseAssignment, "assigned")
            .unwrap();

        assert_eq!(first.seq, 1);
        assert!(first.prev_hash.is_none());
        assert_eq!(second.seq, 2);
        assert_eq!(second.prev_hash, Some(first.hash));
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn each_append_increments_len_by_one() {
        let log = log();
        for i in 0..5u64 {
            assert_eq!(log.len().unwrap(), i);
            log.append(&Actor::System, AuditAction::DataIngestion, "x").unwrap();
        }
        assert_eq!(log.len().unwrap(), 5);
    }

    #[test]
    fn verify_chain_true_after_appends() {
        let log = log();
        for _ in 0..4 {
            log.append(&Actor::System, AuditAction::TypologyScan, "scan").unwrap();
        }
        assert!(log.verify_chain().unwrap());
        assert!(!log.is_sealed().unwrap());
    }

    #[test]
    fn mutated_event_fails_verification_and_seals() {
        let log = log();
        for _ in 0..3 {
            log.append(&Actor::System, AuditAction::DataIngestion, "ingest").unwrap();
        }
        log.inner.write().unwrap().events[0].detail = "Ingested 0 records.".into();

        assert!(!log.verify_chain().unwrap());
        assert!(log.is_sealed().unwrap());

        let err = log
            .append(&Actor::System, AuditAction::Escalation, "after tamper")
            .unwrap_err();
        assert!(matches!(err, AuditError::Sealed { .. }));
        assert_eq!(log.len().unwrap(), 3);
    }

    #[test]
    fn tampered_head_rejected_on_append() {
        let log = log();
        log.append(&Actor::System, AuditAction::CaseCreated, "created").unwrap();
        log.inner.write().unwrap().events[0].actor = Actor::user("mallory");

        let err = log
            .append(&Actor::System, AuditAction::DataIngestion, "next")
            .unwrap_err();
        assert!(matches!(err, AuditError::ChainIntegrity { seq: 1, .. }));
        // Nothing was written and the log is now sealed.
        assert_eq!(log.len().unwrap(), 1);
        assert!(log.is_sealed().unwrap());
    }

    #[test]
    fn tail_returns_most_recent() {
        let log = log();
        for i in 0..5 {
            log.append(&Actor::System, AuditAction::DataIngestion, &format!("{i}"))
                .unwrap();
        }
        let tail = log.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].detail, "3");
        assert_eq!(tail[1].detail, "4");
        assert_eq!(log.tail(10).unwrap().len(), 5);
        assert_eq!(log.head().unwrap().unwrap().detail, "4");
    }

    proptest! {
        #[test]
        fn any_append_sequence_verifies(details in proptest::collection::vec(".{0,40}", 0..20)) {
            let log = log();
            for (i, detail) in details.iter().enumerate() {
                let actor = if i % 2 == 0 { Actor::System } else { Actor::user("analyst") };
                log.append(&actor, AuditAction::PipelineStage("drafting".into()), detail).unwrap();
                prop_assert_eq!(log.len().unwrap(), (i + 1) as u64);
            }
            prop_assert!(log.verify_chain().unwrap());
        }
    }
}
