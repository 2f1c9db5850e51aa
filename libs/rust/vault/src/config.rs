//! Vault client configuration.

use secrecy::SecretString;
use std::time::Duration;
use sync_common::{RetryConfig, TlsOptions};

/// How the client obtains its token.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Static token supplied by the operator
    Token(SecretString),
    /// AppRole login exchanging role id and secret id for a token
    AppRole {
        /// Role id
        role_id: String,
        /// Secret id
        secret_id: SecretString,
        /// Mount path of the AppRole auth backend
        mount: String,
    },
}

impl AuthMethod {
    /// AppRole credentials on the default `approle` mount.
    #[must_use]
    pub fn approle(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self::AppRole {
            role_id: role_id.into(),
            secret_id: SecretString::from(secret_id.into()),
            mount: "approle".to_string(),
        }
    }

    /// Static token credentials.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::from(token.into()))
    }

    /// Whether a rejected token can be replaced by logging in again.
    #[must_use]
    pub const fn can_reauthenticate(&self) -> bool {
        matches!(self, Self::AppRole { .. })
    }

    /// Configuration spelling of the method.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::AppRole { .. } => "approle",
        }
    }
}

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub address: String,
    /// Authentication method
    pub auth: AuthMethod,
    /// Namespace used for login calls
    pub namespace: String,
    /// Request timeout
    pub timeout: Duration,
    /// Backoff policy for unavailable errors
    pub retry: RetryConfig,
    /// Re-login when a leased token has less than this left
    pub grace_period: Duration,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout
    pub circuit_breaker_timeout: Duration,
    /// TLS settings
    pub tls: TlsOptions,
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(address: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            address: address.into(),
            auth,
            namespace: String::new(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            grace_period: Duration::from_secs(60),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(30),
            tls: TlsOptions::default(),
        }
    }

    /// Set the login namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set TLS options.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Set circuit breaker threshold.
    #[must_use]
    pub const fn with_circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before a probe is let through.
    #[must_use]
    pub const fn with_circuit_breaker_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker_timeout = timeout;
        self
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.address.trim_end_matches('/')
    }
}
