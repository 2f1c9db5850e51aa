//! Shared plumbing for the secrets-sync workspace.
//!
//! This crate provides centralized implementations for:
//! - Retryability classification for error types
//! - Retry policies with exponential backoff
//! - Circuit breaker pattern for resilience
//! - HTTP client configuration and building (timeouts, pooling, TLS)
//! - Tracing subscriber initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{HttpClientError, Retryable};
pub use http::{HttpConfig, TlsOptions, build_http_client};
pub use retry::{RetryConfig, RetryPolicy};
pub use tracing_config::{TracingConfig, init_tracing};
