//! Centralized HTTP client configuration and building.
//!
//! Provides one place to turn timeout, pooling and TLS settings into a
//! rustls-backed reqwest client.

use crate::HttpClientError;
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// TLS settings for talking to the secret store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// PEM file with one or more additional CA certificates
    pub ca_cert: Option<PathBuf>,
    /// Directory of PEM CA certificates (`*.pem`, `*.crt`)
    pub ca_path: Option<PathBuf>,
    /// Client certificate for mTLS
    pub client_cert: Option<PathBuf>,
    /// Client private key for mTLS
    pub client_key: Option<PathBuf>,
    /// Skip server certificate verification
    pub skip_verify: bool,
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
    /// TLS settings
    pub tls: TlsOptions,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: concat!("secrets-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            tls: TlsOptions::default(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the TLS options.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns an error if a TLS file cannot be read or parsed, if only half of a
/// client identity is configured, or if reqwest rejects the configuration.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, HttpClientError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    builder = apply_tls(builder, &config.tls)?;

    Ok(builder.build()?)
}

fn apply_tls(
    mut builder: ClientBuilder,
    tls: &TlsOptions,
) -> Result<ClientBuilder, HttpClientError> {
    if let Some(path) = &tls.ca_cert {
        for cert in load_bundle(path)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    if let Some(dir) = &tls.ca_path {
        for path in ca_files_in(dir)? {
            for cert in load_bundle(&path)? {
                builder = builder.add_root_certificate(cert);
            }
        }
    }

    match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => {
            let mut pem = read(key)?;
            pem.push(b'\n');
            pem.extend(read(cert)?);
            let identity = Identity::from_pem(&pem).map_err(|e| HttpClientError::InvalidTls {
                path: cert.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => return Err(HttpClientError::IncompleteIdentity),
    }

    if tls.skip_verify {
        warn!("TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}

fn read(path: &Path) -> Result<Vec<u8>, HttpClientError> {
    std::fs::read(path).map_err(|source| HttpClientError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_bundle(path: &Path) -> Result<Vec<Certificate>, HttpClientError> {
    let pem = read(path)?;
    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| HttpClientError::InvalidTls {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if certs.is_empty() {
        return Err(HttpClientError::InvalidTls {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    debug!(path = %path.display(), count = certs.len(), "Loaded CA certificates");
    Ok(certs)
}

fn ca_files_in(dir: &Path) -> Result<Vec<PathBuf>, HttpClientError> {
    let io_err = |source| HttpClientError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_cert = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "pem" | "crt"));
        if is_cert && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
