use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sar_types::{CaseId, Transaction, TransactionId};

use crate::error::{EvidenceError, EvidenceResult};
use crate::traits::EvidenceStore;

/// In-memory, HashMap-based evidence store.
///
/// Each case's transactions live in a `Vec` in ingestion order. Writes hold
/// the map's write lock for the whole check-then-insert sequence so batches
/// are all-or-nothing.
pub struct InMemoryEvidenceStore {
    cases: RwLock<HashMap<CaseId, Vec<Transaction>>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cases holding evidence.
    pub fn case_count(&self) -> EvidenceResult<usize> {
        Ok(self.read_cases()?.len())
    }

    fn read_cases(&self) -> EvidenceResult<RwLockReadGuard<'_, HashMap<CaseId, Vec<Transaction>>>> {
        self.cases.read().map_err(|_| EvidenceError::LockPoisoned)
    }

    fn write_cases(
        &self,
    ) -> EvidenceResult<RwLockWriteGuard<'_, HashMap<CaseId, Vec<Transaction>>>> {
        self.cases.write().map_err(|_| EvidenceError::LockPoisoned)
    }
}

impl Default for InMemoryEvidenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn ingest(
        &self,
        case_id: &CaseId,
        transactions: Vec<Transaction>,
    ) -> EvidenceResult<usize> {
        let mut cases = self.write_cases()?;

        let existing = cases.get(case_id);
        let mut seen: HashSet<&TransactionId> = existing
            .map(|txs| txs.iter().map(|t| &t.id).collect())
            .unwrap_or_default();
        for tx in &transactions {
            if !seen.insert(&tx.id) {
                return Err(EvidenceError::DuplicateTransaction {
                    case: case_id.clone(),
                    id: tx.id.clone(),
                });
            }
        }

        let count = transactions.len();
        cases
            .entry(case_id.clone())
            .or_default()
            .extend(transactions);
        tracing::debug!(case = %case_id, count, "evidence ingested");
        Ok(count)
    }

    async fn append_correction(
        &self,
        case_id: &CaseId,
        correction: Transaction,
    ) -> EvidenceResult<()> {
        let mut cases = self.write_cases()?;
        let txs = cases
            .get_mut(case_id)
            .ok_or_else(|| EvidenceError::UnknownCase(case_id.clone()))?;

        let Some(superseded) = correction.supersedes.as_ref() else {
            return Err(EvidenceError::MissingSupersedes(correction.id));
        };
        if !txs.iter().any(|t| &t.id == superseded) {
            return Err(EvidenceError::UnknownSuperseded {
                case: case_id.clone(),
                id: superseded.clone(),
            });
        }
        if txs.iter().any(|t| t.id == correction.id) {
            return Err(EvidenceError::DuplicateTransaction {
                case: case_id.clone(),
                id: correction.id,
            });
        }

        tracing::debug!(
            case = %case_id,
            id = %correction.id,
            supersedes = %superseded,
            "evidence correction appended"
        );
        txs.push(correction);
        Ok(())
    }

    async fn transactions(&self, case_id: &CaseId) -> EvidenceResult<Vec<Transaction>> {
        self.read_cases()?
            .get(case_id)
            .cloned()
            .ok_or_else(|| EvidenceError::UnknownCase(case_id.clone()))
    }

    async fn transaction(
        &self,
        case_id: &CaseId,
        id: &TransactionId,
    ) -> EvidenceResult<Option<Transaction>> {
        let cases = self.read_cases()?;
        let txs = cases
            .get(case_id)
            .ok_or_else(|| EvidenceError::UnknownCase(case_id.clone()))?;
        Ok(txs.iter().find(|t| &t.id == id).cloned())
    }

    async fn contains_case(&self, case_id: &CaseId) -> EvidenceResult<bool> {
        Ok(self.read_cases()?.contains_key(case_id))
    }
}

impl std::fmt::Debug for InMemoryEvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.case_count().unwrap_or_default();
        f.debug_struct("InMemoryEvidenceStore")
            .field("case_count", &count)
            .finish()
    }
}
