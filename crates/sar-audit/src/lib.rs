//! Append-only audit log for SAR investigation cases.
//!
//! Every state change in a case is recorded here. This crate provides:
//! - [`AuditEvent`] records whose hashes chain to their predecessor
//! - `AuditWriter` / `AuditReader` trait boundaries
//! - [`InMemoryAuditLog`], one log per case, linearizable appends
//! - [`ChainValidator`] for full-stream integrity reports
//!
//! The log never exposes update or delete operations. Corrections are new,
//! compensating entries.

pub mod error;
pub mod event;
pub mod memory;
pub mod traits;
pub mod validation;

pub use error::AuditError;
pub use event::{AuditAction, AuditEvent};
pub use memory::InMemoryAuditLog;
pub use traits::{AuditReader, AuditWriter};
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind};
