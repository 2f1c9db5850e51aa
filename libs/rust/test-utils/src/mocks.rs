//! Mock secret store for testing.
//!
//! Responses are scripted per secret path. One-shot responses queued with
//! [`MockSecretStore::push_response`] are served first, then the standing
//! response set with [`MockSecretStore::set_secret`] or
//! [`MockSecretStore::fail_with`].

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use sync_vault_client::{FetchRequest, FetchResult, SecretStore, VaultError, VaultResult};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Failure a scripted fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Path absent
    NotFound,
    /// Credentials rejected
    Unauthorized,
    /// Store unreachable
    Unavailable,
}

impl MockFailure {
    fn into_error(self, path: &str) -> VaultError {
        match self {
            Self::NotFound => VaultError::not_found(path),
            Self::Unauthorized => VaultError::unauthorized(format!("403 reading {path}")),
            Self::Unavailable => VaultError::unavailable(format!("503 reading {path}")),
        }
    }
}

type Scripted = Result<FetchResult, MockFailure>;

/// One recorded fetch.
#[derive(Debug, Clone)]
pub struct FetchCall {
    /// Requested path
    pub path: String,
    /// Namespace sent with the request
    pub namespace: String,
    /// When the fetch started
    pub started: Instant,
    /// When the fetch returned
    pub finished: Instant,
}

#[derive(Debug, Default)]
struct State {
    standing: HashMap<String, Scripted>,
    queued: HashMap<String, VecDeque<Scripted>>,
    delays: HashMap<String, Duration>,
    calls: Vec<FetchCall>,
}

/// In-memory [`SecretStore`] with scripted responses.
#[derive(Debug, Default, Clone)]
pub struct MockSecretStore {
    state: Arc<RwLock<State>>,
}

impl MockSecretStore {
    /// Create an empty store; unknown paths return `NotFound`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `result` for `path` until replaced.
    pub async fn set_secret(&self, path: &str, result: FetchResult) {
        self.state
            .write()
            .await
            .standing
            .insert(path.to_string(), Ok(result));
    }

    /// Fail every fetch of `path` until replaced.
    pub async fn fail_with(&self, path: &str, failure: MockFailure) {
        self.state
            .write()
            .await
            .standing
            .insert(path.to_string(), Err(failure));
    }

    /// Queue a one-shot response for `path`.
    pub async fn push_response(&self, path: &str, response: Result<FetchResult, MockFailure>) {
        self.state
            .write()
            .await
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Make every fetch of `path` take `delay`.
    pub async fn set_delay(&self, path: &str, delay: Duration) {
        self.state
            .write()
            .await
            .delays
            .insert(path.to_string(), delay);
    }

    /// Number of fetches made for `path`.
    pub async fn calls(&self, path: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|call| call.path == path)
            .count()
    }

    /// Every fetch made, in completion order.
    pub async fn call_log(&self) -> Vec<FetchCall> {
        self.state.read().await.calls.clone()
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn fetch(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        let started = Instant::now();
        let delay = self.state.read().await.delays.get(&request.path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let scripted = state
            .queued
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.standing.get(&request.path).cloned())
            .unwrap_or(Err(MockFailure::NotFound));

        state.calls.push(FetchCall {
            path: request.path.clone(),
            namespace: request.namespace.clone(),
            started,
            finished: Instant::now(),
        });

        scripted.map_err(|failure| failure.into_error(&request.path))
    }
}
