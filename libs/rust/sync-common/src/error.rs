//! Error plumbing shared by the secrets-sync crates.
//!
//! Errors raised by remote calls are classified as either retryable or
//! non-retryable through [`Retryable`], which is what [`crate::RetryPolicy`]
//! consults before sleeping and trying again.

use std::path::PathBuf;
use thiserror::Error;

/// Classification of transient versus permanent failures.
pub trait Retryable {
    /// Returns `true` when the failed operation may succeed if attempted again.
    fn is_retryable(&self) -> bool;
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::Interrupted
                | ErrorKind::TimedOut
                | ErrorKind::WouldBlock
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
        )
    }
}

/// Errors raised while building an HTTP client.
#[derive(Error, Debug)]
pub enum HttpClientError {
    /// A TLS file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be parsed
    #[error("Invalid TLS material in {path}: {reason}")]
    InvalidTls {
        /// File containing the bad material
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A client certificate was configured without its key, or vice versa
    #[error("Client certificate and client key must be configured together")]
    IncompleteIdentity,

    /// The reqwest builder rejected the configuration
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}
