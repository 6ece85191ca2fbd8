use thiserror::Error;

/// Errors surfaced by the engine and its stores.
///
/// Every failure crossing the crate boundary is either one of the
/// lifecycle sentinels below or a wrapped storage/validation error that
/// preserves the underlying cause for logging.
#[derive(Debug, Error)]
pub enum Error {
    /// No key matches the presented credential.
    #[error("invalid API key")]
    InvalidKey,

    /// The key is not in a validatable state.
    #[error("key is not active")]
    KeyInactive,

    /// The key has passed its expiration time.
    #[error("key has expired")]
    KeyExpired,

    /// The key has been permanently revoked.
    #[error("key has been revoked")]
    KeyRevoked,

    /// The key is temporarily suspended.
    #[error("key is suspended")]
    KeySuspended,

    /// The key exceeded its policy rate limit.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The key exceeded its daily or monthly quota.
    #[error("usage quota exceeded")]
    QuotaExceeded,

    /// Illegal key state change (e.g. reactivating a non-suspended key).
    #[error("invalid state transition")]
    InvalidStateTransition,

    /// The policy is still referenced by at least one non-terminal key.
    #[error("policy is assigned to active keys")]
    PolicyInUse,

    #[error("key not found")]
    KeyNotFound,

    #[error("policy not found")]
    PolicyNotFound,

    #[error("scope not found")]
    ScopeNotFound,

    #[error("rotation record not found")]
    RotationNotFound,

    /// The caller's IP address is not in the policy allowlist.
    #[error("IP address not allowed")]
    IpNotAllowed,

    /// The request origin is not in the policy allowlist.
    #[error("origin not allowed")]
    OriginNotAllowed,

    /// The requested scope is not permitted by the policy.
    #[error("scope not allowed by policy")]
    ScopeNotAllowed,

    /// A uniqueness constraint was violated.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// An opaque backing-store failure.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Malformed input (identifier, prefix, configuration value).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An internal failure such as an exhausted entropy source.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is one of the lookup-miss sentinels.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound | Self::PolicyNotFound | Self::ScopeNotFound | Self::RotationNotFound
        )
    }

    /// Whether this error is a uniqueness-constraint violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
