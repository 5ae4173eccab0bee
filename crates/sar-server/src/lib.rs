//! HTTP API for the SAR case engine.
//!
//! Exposes case commands, the audit trail, pipeline status, evidence
//! cross-references and SAR reports as JSON under `/v1`. The caller's
//! identity is taken from the opaque `x-actor` header.
//!
//! ## Modules
//!
//! - [`actor`] - `x-actor` request extractor
//! - [`config`] - Server configuration
//! - [`error`] - Server errors and the engine error to status mapping
//! - [`handler`] - Request handlers
//! - [`router`] - Route table
//! - [`server`] - Main server struct

pub mod actor;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use actor::{RequestActor, ACTOR_HEADER};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use router::build_router;
pub use server::SarServer;
