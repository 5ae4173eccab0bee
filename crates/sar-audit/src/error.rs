use sar_types::CaseId;

/// Errors produced by audit log operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// The stored chain no longer verifies. Fatal for the log: it is sealed
    /// and refuses further writes until investigated.
    #[error("audit chain integrity violation in case {case} at seq {seq}: {reason}")]
    ChainIntegrity { case: CaseId, seq: u64, reason: String },

    /// Writes were halted after an earlier integrity failure.
    #[error("audit log for case {case} is sealed: {reason}")]
    Sealed { case: CaseId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("audit log lock poisoned")]
    LockPoisoned,
}
