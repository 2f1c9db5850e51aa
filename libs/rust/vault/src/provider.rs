//! Secret store abstraction consumed by the refresh pipeline.

use crate::error::VaultResult;
use crate::kv::{FetchRequest, FetchResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only access to a KV secret store.
///
/// Implementations return every field stored at the requested path. Transient
/// failures are retried inside `fetch`; the error that escapes is final for
/// the caller's cycle.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current (or pinned) values of one secret.
    async fn fetch(&self, request: &FetchRequest) -> VaultResult<FetchResult>;
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn fetch(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        (**self).fetch(request).await
    }
}
