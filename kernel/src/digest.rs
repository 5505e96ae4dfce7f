//! SHA-256 digests: the single hashing implementation for bundle members.
//!
//! Manifest lines, the seal, and the verifier's streamed member hashes all
//! route through this module. Digests are rendered as 64 lowercase hex
//! characters with no algorithm prefix (the `sha256sum` text convention).

use std::fmt;

use sha2::{Digest, Sha256};

/// Raw 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Sum([u8; 32]);

impl Sha256Sum {
    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse exactly 64 hex characters (either case).
    ///
    /// Returns `None` on wrong length or non-hex input.
    #[must_use]
    pub fn parse_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Lowercase hex rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Sha256Sum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Sum({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Sum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash a byte slice in one shot.
#[must_use]
pub fn sha256(data: &[u8]) -> Sha256Sum {
    Sha256Sum(Sha256::digest(data).into())
}

/// Incremental hasher for streamed member content.
#[derive(Default, Clone)]
pub struct StreamingSha256 {
    inner: Sha256,
    len: u64,
}

impl StreamingSha256 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes fed so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn finish(self) -> Sha256Sum {
        Sha256Sum(self.inner.finalize().into())
    }
}

/// Whether `s` is exactly 40 lowercase hex characters (a full commit id).
#[must_use]
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
