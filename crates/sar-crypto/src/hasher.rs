use crate::digest::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"sar-audit-v1"`) that is
/// prepended to every hash computation, so a digest from one domain can
/// never be replayed as a digest of another.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for audit log events.
    pub const AUDIT_EVENT: Self = Self {
        domain: "sar-audit-v1",
    };

    /// Hash `prev ‖ data`; the genesis link hashes `data` alone.
    pub fn hash_linked(&self, prev: Option<&Digest>, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        if let Some(prev) = prev {
            hasher.update(prev.as_bytes());
        }
        hasher.update(data);
        Digest::from_bytes(*hasher.finalize().as_bytes())
    }
}
