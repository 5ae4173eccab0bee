//! Foundation types for the SAR case engine.
//!
//! This crate provides the data model shared by every other `sar-*` crate:
//! investigation cases, the transaction evidence they aggregate, detected
//! typologies, generated narrative sections, and the actors that issue
//! commands.
//!
//! # Key Types
//!
//! - [`Case`] - An investigation case and its read model
//! - [`CaseStatus`] - Position of a case in the filing workflow
//! - [`RiskLevel`] - Policy banding of a 0–100 risk score
//! - [`Transaction`] - Immutable piece of transaction evidence
//! - [`Typology`] - A detected suspicious-activity pattern
//! - [`NarrativeSection`] - A generated narrative section with citations
//! - [`Actor`] - Who issued a command (`system` or a named user)

pub mod actor;
pub mod case;
pub mod error;
pub mod identity;
pub mod money;
pub mod narrative;
pub mod transaction;
pub mod typology;

pub use actor::Actor;
pub use case::{Case, CaseStatus, CaseSummary, Customer, RiskLevel};
pub use error::TypeError;
pub use identity::{CaseId, CustomerId, EventId, SectionId, TransactionId, TypologyId};
pub use money::Money;
pub use narrative::{Narrative, NarrativeSection};
pub use transaction::{in_force, Direction, Instrument, Transaction};
pub use typology::Typology;
