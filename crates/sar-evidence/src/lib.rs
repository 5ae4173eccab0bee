//! Transaction evidence storage for SAR investigation cases.
//!
//! Evidence is append-only. Once a transaction is ingested into a case it is
//! never updated or removed; a correction is a new transaction that names
//! the one it supersedes.
//!
//! The [`EvidenceStore`] trait is async because production backends sit
//! behind I/O. [`InMemoryEvidenceStore`] backs tests and embedded use.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{EvidenceError, EvidenceResult};
pub use memory::InMemoryEvidenceStore;
pub use traits::EvidenceStore;
