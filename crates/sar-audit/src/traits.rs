use sar_types::{Actor, CaseId};

use crate::error::AuditError;
use crate::event::{AuditAction, AuditEvent};

/// Write boundary for a case's audit log.
///
/// `append` is the sole write primitive. It either stores a fully chained
/// event or stores nothing.
pub trait AuditWriter: Send + Sync {
    fn append(
        &self,
        actor: &Actor,
        action: AuditAction,
        detail: &str,
    ) -> Result<AuditEvent, AuditError>;
}

/// Read boundary for a case's audit log.
pub trait AuditReader: Send + Sync {
    fn case_id(&self) -> &CaseId;

    /// All events in append order.
    fn events(&self) -> Result<Vec<AuditEvent>, AuditError>;

    /// The most recent `n` events, oldest first.
    fn tail(&self, n: usize) -> Result<Vec<AuditEvent>, AuditError>;

    fn head(&self) -> Result<Option<AuditEvent>, AuditError>;

    fn len(&self) -> Result<u64, AuditError>;

    fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }
}
