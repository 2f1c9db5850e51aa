//! Vault error types using thiserror 2.0.
//!
//! Errors are grouped into the three fetch failure kinds the refresh pipeline
//! reacts to, with retryability classification for the backoff loop.

use sync_common::{HttpClientError, Retryable};
use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Secret path absent, or latest KV v2 version deleted
    #[error("Secret not found at path: {0}")]
    NotFound(String),

    /// Token invalid or expired, or policy denies the path
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Vault server unavailable
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Response did not have the expected shape
    #[error("Malformed response from {path}: {reason}")]
    MalformedResponse {
        /// API path that was read
        path: String,
        /// What was wrong
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP client could not be built
    #[error(transparent)]
    HttpClient(#[from] HttpClientError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Coarse failure classes for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Path absent; nothing to write this cycle
    NotFound,
    /// Credentials rejected
    Unauthorized,
    /// Network or server trouble
    Unavailable,
    /// Client-side or protocol problem
    Invalid,
}

impl FetchErrorKind {
    /// Stable lowercase name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
        }
    }
}

impl VaultError {
    /// Failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::NotFound(_) => FetchErrorKind::NotFound,
            Self::Unauthorized(_) => FetchErrorKind::Unauthorized,
            Self::Unavailable(_) | Self::RateLimited | Self::CircuitBreakerOpen | Self::Http(_) => {
                FetchErrorKind::Unavailable
            }
            Self::MalformedResponse { .. }
            | Self::Serialization(_)
            | Self::HttpClient(_)
            | Self::InvalidConfig(_) => FetchErrorKind::Invalid,
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an unauthorized error.
    #[must_use]
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a secret not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a malformed response error.
    #[must_use]
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl Retryable for VaultError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_)
        )
    }
}
