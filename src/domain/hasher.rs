//! One-way hashing of raw API keys.

use std::fmt::Debug;

use sha2::{Digest, Sha256};

use crate::domain::error::Result;

/// Deterministic one-way transform of raw keys.
///
/// `hash` must be deterministic and salt-free because the store looks
/// keys up *by hash*; a memory-hard implementation is allowed as long as
/// it keeps that property. `verify` re-hashes and compares without
/// short-circuiting on the first differing byte.
pub trait KeyHasher: Send + Sync + Debug {
    /// Produce a fixed-width ASCII fingerprint of the raw key.
    fn hash(&self, raw_key: &str) -> Result<String>;

    /// Check whether a raw key matches a stored fingerprint.
    fn verify(&self, raw_key: &str, fingerprint: &str) -> Result<bool> {
        let computed = self.hash(raw_key)?;
        Ok(constant_time_eq(computed.as_bytes(), fingerprint.as_bytes()))
    }
}

/// Reference hasher: SHA-256, 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl KeyHasher for Sha256Hasher {
    fn hash(&self, raw_key: &str) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(raw_key.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Constant-time byte comparison. The length check is the only early
/// exit; mismatched lengths leak no secret content.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
