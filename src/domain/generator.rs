//! Raw API key generation.

use std::fmt::Debug;

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;

use crate::domain::error::{Error, Result};
use crate::domain::key::Environment;

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]{1,8}$").expect("valid regex"));

/// Produces raw key strings in the canonical wire format
/// `{prefix}_{environment}_{suffix}`.
pub trait KeyGenerator: Send + Sync + Debug {
    fn generate(&self, prefix: &str, environment: Environment) -> Result<String>;
}

/// Reference generator: the suffix is 64 lowercase hex characters from
/// 32 bytes of OS randomness. An entropy-source failure surfaces as an
/// error rather than degrading to weaker randomness.
#[derive(Debug, Clone)]
pub struct HexKeyGenerator {
    byte_len: usize,
}

impl HexKeyGenerator {
    pub fn new() -> Self {
        Self { byte_len: 32 }
    }

    pub fn with_byte_len(mut self, byte_len: usize) -> Self {
        self.byte_len = byte_len;
        self
    }
}

impl Default for HexKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator for HexKeyGenerator {
    fn generate(&self, prefix: &str, environment: Environment) -> Result<String> {
        if !PREFIX_RE.is_match(prefix) {
            return Err(Error::validation(format!(
                "key prefix {prefix:?} must be 1-8 lowercase alphanumeric characters"
            )));
        }

        let mut buf = vec![0u8; self.byte_len];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Error::internal(format!("entropy source failure: {e}")))?;

        Ok(format!("{}_{}_{}", prefix, environment, hex::encode(buf)))
    }
}
