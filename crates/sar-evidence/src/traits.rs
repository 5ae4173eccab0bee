use async_trait::async_trait;
use sar_types::{CaseId, Transaction, TransactionId};

use crate::error::EvidenceResult;

/// Per-case transaction evidence.
///
/// Implementations must satisfy:
/// - Transaction ids are unique within a case.
/// - Stored transactions are never modified or deleted.
/// - A batch ingest stores every transaction or none of them.
/// - Reads return transactions in ingestion order.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Store a batch of transactions for a case, creating the case's
    /// evidence set on first use. Returns the number stored.
    async fn ingest(&self, case_id: &CaseId, transactions: Vec<Transaction>)
        -> EvidenceResult<usize>;

    /// Append a correcting transaction. Its `supersedes` field must name an
    /// existing transaction of the same case.
    async fn append_correction(&self, case_id: &CaseId, correction: Transaction)
        -> EvidenceResult<()>;

    /// Every transaction of the case, in ingestion order.
    async fn transactions(&self, case_id: &CaseId) -> EvidenceResult<Vec<Transaction>>;

    /// A single transaction, or `None` if the case does not hold it.
    async fn transaction(
        &self,
        case_id: &CaseId,
        id: &TransactionId,
    ) -> EvidenceResult<Option<Transaction>>;

    async fn contains_case(&self, case_id: &CaseId) -> EvidenceResult<bool>;

    /// The latest correction that supersedes `id`, if any.
    async fn correction_for(
        &self,
        case_id: &CaseId,
        id: &TransactionId,
    ) -> EvidenceResult<Option<Transaction>> {
        let transactions = self.transactions(case_id).await?;
        Ok(transactions
            .into_iter()
            .rev()
            .find(|t| t.supersedes.as_ref() == Some(id)))
    }
}
