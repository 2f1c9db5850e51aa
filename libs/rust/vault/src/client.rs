//! Vault HTTP client with retry, circuit breaker and AppRole re-login.

use crate::{
    config::{AuthMethod, VaultConfig},
    error::{VaultError, VaultResult},
    kv::{FetchRequest, FetchResult, KvVersion, SecretVersion},
    provider::SecretStore,
    secrets::{AuthResponse, ErrorResponse, KvV1Response, KvV2Response, stringify_fields},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use sync_common::{CircuitBreaker, CircuitBreakerConfig, HttpConfig, RetryPolicy, build_http_client};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

#[derive(Clone)]
struct CachedToken {
    value: SecretString,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn needs_refresh(&self, grace: Duration) -> bool {
        self.expires_at
            .is_some_and(|exp| exp.saturating_duration_since(Instant::now()) < grace)
    }
}

/// Vault KV client. Cheap to share behind an `Arc`; the HTTP pool, token and
/// circuit breaker are shared by every caller.
pub struct VaultClient {
    config: VaultConfig,
    http: Client,
    token: RwLock<Option<CachedToken>>,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreaker,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Fails when the address is empty or the HTTP client cannot be built
    /// from the TLS options.
    pub fn new(config: VaultConfig) -> VaultResult<Self> {
        if config.address.trim().is_empty() {
            return Err(VaultError::InvalidConfig("address is empty".to_string()));
        }

        let http = build_http_client(
            &HttpConfig::default()
                .with_timeout(config.timeout)
                .with_tls(config.tls.clone()),
        )?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_threshold,
            success_threshold: 1,
            timeout: config.circuit_breaker_timeout,
            half_open_max_requests: 1,
        };

        let token = match &config.auth {
            AuthMethod::Token(value) => Some(CachedToken {
                value: value.clone(),
                expires_at: None,
            }),
            AuthMethod::AppRole { .. } => None,
        };

        Ok(Self {
            retry: RetryPolicy::new(config.retry.clone()),
            circuit_breaker: CircuitBreaker::new("vault", cb_config),
            token: RwLock::new(token),
            config,
            http,
        })
    }

    /// Log in with AppRole credentials.
    #[instrument(skip(self), fields(method = self.config.auth.name()))]
    pub async fn authenticate(&self) -> VaultResult<()> {
        let fresh = self.login().await?;
        *self.token.write().await = Some(fresh);
        Ok(())
    }

    async fn login(&self) -> VaultResult<CachedToken> {
        let AuthMethod::AppRole {
            role_id,
            secret_id,
            mount,
        } = &self.config.auth
        else {
            return Err(VaultError::unauthorized("static token rejected by Vault"));
        };

        let url = format!(
            "{}/v1/auth/{}/login",
            self.config.base_url(),
            mount.trim_matches('/')
        );
        let body = serde_json::json!({
            "role_id": role_id,
            "secret_id": secret_id.expose_secret(),
        });

        let mut request = self.http.post(&url).json(&body);
        if !self.config.namespace.is_empty() {
            request = request.header(NAMESPACE_HEADER, &self.config.namespace);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = error_text(response).await;
            return Err(match status.as_u16() {
                400 | 401 | 403 => {
                    VaultError::unauthorized(format!("AppRole login rejected ({status}): {reason}"))
                }
                429 => VaultError::RateLimited,
                _ => VaultError::unavailable(format!("AppRole login failed ({status}): {reason}")),
            });
        }

        let auth: AuthResponse = response.json().await?;
        let ttl = Duration::from_secs(auth.auth.lease_duration);
        info!(
            ttl_secs = ttl.as_secs(),
            renewable = auth.auth.renewable,
            "Authenticated with Vault"
        );

        Ok(CachedToken {
            value: SecretString::from(auth.auth.client_token),
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        })
    }

    async fn current_token(&self) -> VaultResult<SecretString> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if !cached.needs_refresh(self.config.grace_period) {
                    return Ok(cached.value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        if let Some(cached) = guard.as_ref() {
            if !cached.needs_refresh(self.config.grace_period) {
                return Ok(cached.value.clone());
            }
        }
        let fresh = self.login().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        if self.config.auth.can_reauthenticate() {
            *self.token.write().await = None;
        }
    }

    async fn fetch_once(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        if !self.circuit_breaker.allow_request() {
            warn!(path = %request.path, "Circuit breaker open for Vault");
            return Err(VaultError::CircuitBreakerOpen);
        }

        let result = match self.read(request).await {
            Err(VaultError::Unauthorized(reason)) if self.config.auth.can_reauthenticate() => {
                warn!(path = %request.path, %reason, "Token rejected, logging in again");
                self.invalidate_token().await;
                self.read(request).await
            }
            other => other,
        };

        // Any answer that is not a transient failure means the store is
        // reachable; it also ends a half-open probe.
        match &result {
            Err(e) if sync_common::Retryable::is_retryable(e) => {
                self.circuit_breaker.record_failure();
            }
            _ => self.circuit_breaker.record_success(),
        }

        result
    }

    async fn read(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        let token = self.current_token().await?;
        let api_path = request.api_path();
        let url = format!("{}/v1/{}", self.config.base_url(), api_path);

        let mut builder = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, token.expose_secret());
        if !request.namespace.is_empty() {
            builder = builder.header(NAMESPACE_HEADER, &request.namespace);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &api_path, response).await);
        }

        let body: serde_json::Value = response.json().await?;
        parse_fetch(request.kv_version, &api_path, body)
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    #[instrument(
        skip(self, request),
        fields(
            path = %request.path,
            mount = %request.mount_path,
            namespace = %request.namespace,
            kv = %request.kv_version,
        )
    )]
    async fn fetch(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        debug!("Reading secret");
        let result = self
            .retry
            .execute("vault.fetch", || self.fetch_once(request))
            .await?;
        debug!(version = %result.version, fields = result.values.len(), "Secret read");
        Ok(result)
    }
}

async fn error_text(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) if !body.errors.is_empty() => body.errors.join("; "),
        _ => text,
    }
}

async fn status_error(status: StatusCode, path: &str, response: Response) -> VaultError {
    match status.as_u16() {
        404 => VaultError::not_found(path),
        401 | 403 => {
            let reason = error_text(response).await;
            VaultError::unauthorized(format!("{status} reading {path}: {reason}"))
        }
        429 => VaultError::RateLimited,
        s if s >= 500 => {
            let reason = error_text(response).await;
            VaultError::unavailable(format!("{status} reading {path}: {reason}"))
        }
        _ => {
            let reason = error_text(response).await;
            VaultError::malformed(path, format!("unexpected status {status}: {reason}"))
        }
    }
}

fn parse_fetch(
    kv_version: KvVersion,
    path: &str,
    body: serde_json::Value,
) -> VaultResult<FetchResult> {
    match kv_version {
        KvVersion::V1 => {
            let response: KvV1Response = serde_json::from_value(body)?;
            let fields = response
                .data
                .ok_or_else(|| VaultError::malformed(path, "missing data"))?;
            Ok(FetchResult::new(
                stringify_fields(fields),
                SecretVersion::Unversioned,
            ))
        }
        KvVersion::V2 => {
            let response: KvV2Response = serde_json::from_value(body)?;
            let envelope = response
                .data
                .ok_or_else(|| VaultError::malformed(path, "missing data"))?;
            let metadata = envelope.metadata.unwrap_or_default();
            match envelope.data {
                Some(fields) if !metadata.is_deleted() => Ok(FetchResult::new(
                    stringify_fields(fields),
                    SecretVersion::Version(metadata.version),
                )),
                _ => Err(VaultError::not_found(format!(
                    "{path} (version {} deleted)",
                    metadata.version
                ))),
            }
        }
    }
}
