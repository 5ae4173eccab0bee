//! Evidence cross-reference index.
//!
//! Maps every transaction of a case to the narrative sections and typologies
//! that cite it, and each section or typology back to its ordered citations.
//! The index is derived data: it is rebuilt from scratch whenever the
//! narrative completes or the typology set changes, and construction fails
//! on any reference to a transaction the case does not hold.
//!
//! # Key Types
//!
//! - [`CrossReferenceIndex`] -- The bidirectional citation map
//! - [`Referrer`] -- What cites a transaction (a section or a typology)
//! - [`IndexError`] -- Dangling and duplicate reference failures

pub mod error;
pub mod index;
pub mod referrer;

pub use error::{IndexError, IndexResult};
pub use index::{CrossReferenceIndex, TransactionRefs};
pub use referrer::Referrer;
