//! Prefix-tagged entity identifiers.
//!
//! Every entity uses the same opaque [`Id`] value type: a 4-character
//! prefix naming the entity kind plus a UUIDv7 payload rendered as 26
//! lowercase Crockford base32 characters (`akey_01h2xcejqtf2nbrexx3vqjhp41`).
//! IDs are globally unique, URL-safe, and sort chronologically within a
//! prefix because the payload is time-ordered.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::Error;

/// Entity kind encoded in an identifier's textual prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Prefix {
    /// API keys (`akey`).
    Key,
    /// Key policies (`kpol`).
    Policy,
    /// Permission scopes (`kscp`).
    Scope,
    /// Usage records (`kusg`).
    Usage,
    /// Rotation records (`krot`).
    Rotation,
}

impl Prefix {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Key => "akey",
            Self::Policy => "kpol",
            Self::Scope => "kscp",
            Self::Usage => "kusg",
            Self::Rotation => "krot",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "akey" => Some(Self::Key),
            "kpol" => Some(Self::Policy),
            "kscp" => Some(Self::Scope),
            "kusg" => Some(Self::Usage),
            "krot" => Some(Self::Rotation),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary identifier type for all entities.
///
/// Constructors always produce valid IDs; the prefix-checked parsers
/// reject any string whose prefix does not match the expected kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id {
    prefix: Prefix,
    uuid: Uuid,
}

/// Identifier for API keys (prefix `akey`).
pub type KeyId = Id;

/// Identifier for key policies (prefix `kpol`).
pub type PolicyId = Id;

/// Identifier for permission scopes (prefix `kscp`).
pub type ScopeId = Id;

/// Identifier for usage records (prefix `kusg`).
pub type UsageId = Id;

/// Identifier for rotation records (prefix `krot`).
pub type RotationId = Id;

impl Id {
    /// Generate a new unique ID with the given prefix.
    pub fn generate(prefix: Prefix) -> Self {
        Self {
            prefix,
            uuid: Uuid::now_v7(),
        }
    }

    pub fn new_key() -> Self {
        Self::generate(Prefix::Key)
    }

    pub fn new_policy() -> Self {
        Self::generate(Prefix::Policy)
    }

    pub fn new_scope() -> Self {
        Self::generate(Prefix::Scope)
    }

    pub fn new_usage() -> Self {
        Self::generate(Prefix::Usage)
    }

    pub fn new_rotation() -> Self {
        Self::generate(Prefix::Rotation)
    }

    /// Parse an identifier of any kind from its textual form.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::validation("id: empty string"));
        }

        let (tag, suffix) = s
            .split_once('_')
            .ok_or_else(|| Error::validation(format!("id: malformed identifier {s:?}")))?;

        let prefix = Prefix::from_tag(tag)
            .ok_or_else(|| Error::validation(format!("id: unknown prefix {tag:?}")))?;

        let bits = decode_suffix(suffix)
            .ok_or_else(|| Error::validation(format!("id: malformed suffix in {s:?}")))?;

        Ok(Self {
            prefix,
            uuid: Uuid::from_u128(bits),
        })
    }

    /// Parse an identifier and validate that it carries the expected prefix.
    pub fn parse_expect(s: &str, expected: Prefix) -> Result<Self, Error> {
        let parsed = Self::parse(s)?;
        if parsed.prefix != expected {
            return Err(Error::validation(format!(
                "id: expected prefix {:?}, got {:?}",
                expected.as_str(),
                parsed.prefix.as_str()
            )));
        }
        Ok(parsed)
    }

    pub fn parse_key(s: &str) -> Result<Self, Error> {
        Self::parse_expect(s, Prefix::Key)
    }

    pub fn parse_policy(s: &str) -> Result<Self, Error> {
        Self::parse_expect(s, Prefix::Policy)
    }

    pub fn parse_scope(s: &str) -> Result<Self, Error> {
        Self::parse_expect(s, Prefix::Scope)
    }

    pub fn parse_usage(s: &str) -> Result<Self, Error> {
        Self::parse_expect(s, Prefix::Usage)
    }

    pub fn parse_rotation(s: &str) -> Result<Self, Error> {
        Self::parse_expect(s, Prefix::Rotation)
    }

    /// The entity kind this identifier names.
    pub fn prefix(&self) -> Prefix {
        self.prefix
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix.as_str(), encode_suffix(&self.uuid))
    }
}

impl TryFrom<String> for Id {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_string()
    }
}

// Crockford base32, lowercase. The 128 uuid bits pack into 26 characters
// of 5 bits each; the first character carries only the top 3 bits and is
// therefore always in '0'..='7'.
const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

fn encode_suffix(uuid: &Uuid) -> String {
    let bits = uuid.as_u128();
    let mut out = [0u8; 26];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = 5 * (25 - i);
        *slot = ALPHABET[((bits >> shift) & 0x1f) as usize];
    }
    // Alphabet bytes are all ASCII.
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_suffix(s: &str) -> Option<u128> {
    if s.len() != 26 {
        return None;
    }
    let mut bits: u128 = 0;
    for (i, b) in s.bytes().enumerate() {
        let value = ALPHABET.iter().position(|&c| c == b)? as u128;
        if i == 0 && value > 7 {
            return None;
        }
        bits = (bits << 5) | value;
    }
    Some(bits)
}
