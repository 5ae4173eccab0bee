use crate::digest::Digest;
use crate::hasher::ContentHasher;

/// A record that participates in a hash chain.
pub trait ChainLink {
    /// The record's own hash.
    fn link_hash(&self) -> Digest;
    /// The previous record's hash (`None` for genesis).
    fn prev_hash(&self) -> Option<Digest>;
    /// Canonical payload bytes the hash was computed over.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of records forms a valid chain: each record's
/// `prev_hash` matches the previous record's `link_hash`, and each
/// `link_hash` equals `hash(prev_hash ‖ payload)`.
pub struct HashChainVerifier {
    hasher: ContentHasher,
}

impl HashChainVerifier {
    pub const fn new(hasher: ContentHasher) -> Self {
        Self { hasher }
    }

    /// Verify a chain from its first record.
    ///
    /// Checks:
    /// 1. First record has no previous hash
    /// 2. Each subsequent record's prev_hash matches the previous link_hash
    /// 3. Each record's hash is correct for its payload
    pub fn verify_chain(&self, links: &[impl ChainLink]) -> Result<(), ChainError> {
        let Some(first) = links.first() else {
            return Ok(());
        };

        if first.prev_hash().is_some() {
            return Err(ChainError::GenesisHasPrevHash);
        }
        if self.compute_hash(&first.payload_bytes(), None) != first.link_hash() {
            return Err(ChainError::HashMismatch { index: 0 });
        }

        for i in 1..links.len() {
            let expected_prev = links[i - 1].link_hash();
            match links[i].prev_hash() {
                Some(prev) if prev == expected_prev => {}
                Some(_) => return Err(ChainError::BrokenLink { index: i }),
                None => return Err(ChainError::MissingPrevHash { index: i }),
            }

            let computed = self.compute_hash(&links[i].payload_bytes(), Some(&expected_prev));
            if computed != links[i].link_hash() {
                return Err(ChainError::HashMismatch { index: i });
            }
        }

        Ok(())
    }

    /// Compute the expected hash for a payload and optional previous hash.
    pub fn compute_hash(&self, payload: &[u8], prev_hash: Option<&Digest>) -> Digest {
        self.hasher.hash_linked(prev_hash, payload)
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("genesis record has a previous hash (should be None)")]
    GenesisHasPrevHash,

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: usize },

    #[error("missing prev_hash at index {index} (should reference previous record)")]
    MissingPrevHash { index: usize },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },
}

impl ChainError {
    /// Index of the first offending record.
    pub fn index(&self) -> usize {
        match self {
            Self::GenesisHasPrevHash => 0,
            Self::BrokenLink { index }
            | Self::MissingPrevHash { index }
            | Self::HashMismatch { index } => *index,
        }
    }
}
