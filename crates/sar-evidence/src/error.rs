use sar_types::{CaseId, TransactionId};

/// Errors produced by evidence store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("no evidence recorded for case {0}")]
    UnknownCase(CaseId),

    #[error("transaction {id} already exists in case {case}")]
    DuplicateTransaction { case: CaseId, id: TransactionId },

    /// A correction names a transaction the case does not hold.
    #[error("transaction {id} superseded by a correction does not exist in case {case}")]
    UnknownSuperseded { case: CaseId, id: TransactionId },

    #[error("correction {0} does not name the transaction it supersedes")]
    MissingSupersedes(TransactionId),

    #[error("evidence store lock poisoned")]
    LockPoisoned,

    /// Backend failure (I/O, network) from a non-memory implementation.
    #[error("evidence backend error: {0}")]
    Backend(String),
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;
