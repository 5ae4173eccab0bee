//! Error types for the index crate.

use sar_types::{SectionId, TransactionId, TypologyId};

use crate::referrer::Referrer;

/// Errors that can occur while building or querying the index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// A section or typology cites a transaction the case does not hold.
    #[error("{referrer} cites unknown transaction {transaction}")]
    DanglingReference {
        referrer: Referrer,
        transaction: TransactionId,
    },

    #[error("duplicate narrative section id: {0}")]
    DuplicateSection(SectionId),

    #[error("duplicate typology id: {0}")]
    DuplicateTypology(TypologyId),

    #[error("transaction not indexed: {0}")]
    UnknownTransaction(TransactionId),

    #[error("section not indexed: {0}")]
    UnknownSection(SectionId),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
