//! Vault/OpenBao KV client for secrets-sync.
//!
//! Reads KV v1 and v2 secrets with token or AppRole authentication, retrying
//! transient failures with backoff behind a circuit breaker.

pub mod client;
pub mod config;
pub mod error;
pub mod kv;
pub mod provider;
pub mod secrets;

pub use client::VaultClient;
pub use config::{AuthMethod, VaultConfig};
pub use error::{FetchErrorKind, VaultError, VaultResult};
pub use kv::{FetchRequest, FetchResult, KvVersion, ParseKvVersionError, SecretVersion};
pub use provider::SecretStore;
