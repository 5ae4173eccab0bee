//! Hashing primitives for the SAR case engine.
//!
//! Provides domain-separated BLAKE3 digests and hash chain verification for
//! the tamper-evident audit log.
//!
//! All crypto operations wrap established libraries.

pub mod chain;
pub mod digest;
pub mod hasher;

pub use chain::{ChainError, ChainLink, HashChainVerifier};
pub use digest::Digest;
pub use hasher::ContentHasher;
