//! Type-safe configuration with validation.
//!
//! The YAML file is read once at startup, environment references are
//! expanded, defaults are applied and every rule is checked before anything
//! talks to the secret store. The resulting [`Config`] never changes.

mod env;
mod raw;
mod values;

pub use env::{expand_env, expand_with};
pub use values::{mode_from_integer, parse_duration, parse_mode};

use crate::error::RenderError;
use crate::render::SecretRenderer;
use crate::secret::{FileTarget, Secret, TemplateEntry};
use raw::{DurationValue, ModeValue, RawConfig, RawSecret, RawSecretStore};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_common::TlsOptions;
use sync_vault_client::{AuthMethod, KvVersion, VaultConfig};
use thiserror::Error;
use url::Url;

/// Config file used when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";
/// Refresh interval for secrets that do not set one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Mode for files that do not set one.
pub const DEFAULT_FILE_MODE: u32 = 0o600;
/// KV mount used when neither the store nor the secret names one.
pub const DEFAULT_MOUNT_PATH: &str = "secret";

const STORE_SCOPE: &str = "secretStore";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid YAML or has the wrong shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Store address is empty
    #[error("secretStore.address is required")]
    MissingAddress,

    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Config field
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Unknown authentication method
    #[error("Invalid auth method {0:?}: must be \"token\" or \"approle\"")]
    InvalidAuthMethod(String),

    /// Token auth without a token
    #[error("secretStore.token is required for token auth")]
    MissingToken,

    /// AppRole auth without credentials
    #[error("secretStore.roleId and secretStore.secretId are required for approle auth")]
    MissingAppRoleCredentials,

    /// No secrets declared
    #[error("at least one secret must be configured")]
    NoSecrets,

    /// Required secret field is empty
    #[error("secret {secret}: {field} is required")]
    MissingField {
        /// Secret name, or its position when unnamed
        secret: String,
        /// Missing field
        field: &'static str,
    },

    /// Two secrets share a name
    #[error("duplicate secret name {0:?}")]
    DuplicateSecretName(String),

    /// KV version is not `v1` or `v2`
    #[error("{scope}: invalid kvVersion {value:?}: must be \"v1\" or \"v2\"")]
    InvalidKvVersion {
        /// `secretStore` or the secret name
        scope: String,
        /// Configured value
        value: String,
    },

    /// Refresh interval could not be parsed
    #[error("secret {secret}: invalid refreshInterval {value:?}: {reason}")]
    InvalidDuration {
        /// Secret name
        secret: String,
        /// Configured value
        value: String,
        /// What was wrong
        reason: String,
    },

    /// Refresh interval is zero
    #[error("secret {secret}: refreshInterval must be greater than 0")]
    NonPositiveInterval {
        /// Secret name
        secret: String,
    },

    /// Secret has no target files
    #[error("secret {secret}: at least one file is required")]
    NoFiles {
        /// Secret name
        secret: String,
    },

    /// Template and file lists differ in length
    #[error("secret {secret}: {templates} templates but {files} files; each template needs exactly one file")]
    TemplateFileMismatch {
        /// Secret name
        secret: String,
        /// Number of templates
        templates: usize,
        /// Number of files
        files: usize,
    },

    /// File mode could not be parsed
    #[error("secret {secret}: invalid mode for {path}: {reason}")]
    InvalidMode {
        /// Secret name
        secret: String,
        /// File path
        path: String,
        /// What was wrong
        reason: String,
    },

    /// Two files share a target path
    #[error("file {path} is written by both {first} and {second}")]
    DuplicatePath {
        /// Target path
        path: PathBuf,
        /// Secret that claimed the path first
        first: String,
        /// Secret that claimed it again
        second: String,
    },

    /// Version pinned on a KV v1 secret
    #[error("secret {secret}: version can only be pinned with kvVersion v2")]
    VersionPinRequiresV2 {
        /// Secret name
        secret: String,
    },

    /// Template does not parse
    #[error("secret {secret}: {source}")]
    InvalidTemplate {
        /// Secret name
        secret: String,
        /// Parse failure
        source: RenderError,
    },
}

/// Secret store connection settings.
#[derive(Debug, Clone)]
pub struct SecretStoreConfig {
    /// Store address
    pub address: String,
    /// Authentication method with credentials
    pub auth: AuthMethod,
    /// Default KV version for secrets
    pub kv_version: KvVersion,
    /// Default mount path for secrets
    pub mount_path: String,
    /// Global namespace
    pub namespace: String,
    /// TLS settings
    pub tls: TlsOptions,
}

impl SecretStoreConfig {
    /// Client configuration for this store.
    #[must_use]
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig::new(&self.address, self.auth.clone())
            .with_namespace(&self.namespace)
            .with_tls(self.tls.clone())
    }
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store settings
    pub secret_store: SecretStoreConfig,
    /// Secrets in declaration order
    pub secrets: Vec<Secret>,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A `.env` file in the working directory, if any, is loaded into the
    /// environment first.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML, expanding references from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for parse or validation failures.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with(yaml, |name| std::env::var(name).ok())
    }

    /// Parse and validate YAML, expanding references with `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for parse or validation failures.
    pub fn from_yaml_with<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        env::expand_tree(&mut document, &lookup);
        let raw: RawConfig = if document.is_null() {
            RawConfig::default()
        } else {
            serde_yaml::from_value(document)?
        };
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let secret_store = build_store(raw.secret_store)?;
        if raw.secrets.is_empty() {
            return Err(ConfigError::NoSecrets);
        }

        let mut names = HashSet::new();
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();
        let mut secrets = Vec::with_capacity(raw.secrets.len());

        for (index, raw_secret) in raw.secrets.into_iter().enumerate() {
            let secret = build_secret(index, raw_secret, &secret_store)?;
            if !names.insert(secret.name.clone()) {
                return Err(ConfigError::DuplicateSecretName(secret.name));
            }
            for file in &secret.files {
                if let Some(first) = claimed.insert(file.path.clone(), secret.name.clone()) {
                    return Err(ConfigError::DuplicatePath {
                        path: file.path.clone(),
                        first,
                        second: secret.name.clone(),
                    });
                }
            }
            secrets.push(secret);
        }

        Ok(Self {
            secret_store,
            secrets,
        })
    }
}

fn build_store(raw: RawSecretStore) -> Result<SecretStoreConfig, ConfigError> {
    if raw.address.is_empty() {
        return Err(ConfigError::MissingAddress);
    }
    validate_address(&raw.address)?;

    let auth = match raw.auth_method.to_ascii_lowercase().as_str() {
        "" | "token" => {
            if raw.token.is_empty() {
                return Err(ConfigError::MissingToken);
            }
            AuthMethod::token(raw.token)
        }
        "approle" => {
            if raw.role_id.is_empty() || raw.secret_id.is_empty() {
                return Err(ConfigError::MissingAppRoleCredentials);
            }
            AuthMethod::approle(raw.role_id, raw.secret_id)
        }
        _ => return Err(ConfigError::InvalidAuthMethod(raw.auth_method)),
    };

    let kv_version = parse_kv_version(STORE_SCOPE, raw.kv_version.as_deref().unwrap_or("v2"))?;

    Ok(SecretStoreConfig {
        address: raw.address,
        auth,
        kv_version,
        mount_path: raw
            .mount_path
            .unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
        namespace: raw.namespace,
        tls: TlsOptions {
            ca_cert: optional_path(raw.tls_ca_cert),
            ca_path: optional_path(raw.tls_ca_path),
            client_cert: optional_path(raw.tls_client_cert),
            client_key: optional_path(raw.tls_client_key),
            skip_verify: raw.tls_skip_verify,
        },
    })
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field: format!("{STORE_SCOPE}.address"),
        reason,
    };
    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    Ok(())
}

fn build_secret(
    index: usize,
    raw: RawSecret,
    store: &SecretStoreConfig,
) -> Result<Secret, ConfigError> {
    if raw.name.is_empty() {
        return Err(ConfigError::MissingField {
            secret: format!("secrets[{index}]"),
            field: "name",
        });
    }
    let name = raw.name;
    let missing = |field| ConfigError::MissingField {
        secret: name.clone(),
        field,
    };

    if raw.key.is_empty() {
        return Err(missing("key"));
    }

    let mount_path = match raw.mount_path {
        Some(mount) if !mount.is_empty() => mount,
        _ => store.mount_path.clone(),
    };
    if mount_path.is_empty() {
        return Err(missing("mountPath"));
    }

    let kv_version = match raw.kv_version.as_deref() {
        Some(version) if !version.is_empty() => parse_kv_version(&name, version)?,
        _ => store.kv_version,
    };
    if raw.version.is_some() && kv_version != KvVersion::V2 {
        return Err(ConfigError::VersionPinRequiresV2 { secret: name });
    }

    let refresh_interval = refresh_interval(&name, raw.refresh_interval)?;

    if raw.files.is_empty() {
        return Err(ConfigError::NoFiles { secret: name });
    }
    if raw.template.data.len() != raw.files.len() {
        return Err(ConfigError::TemplateFileMismatch {
            secret: name,
            templates: raw.template.data.len(),
            files: raw.files.len(),
        });
    }

    let mut files = Vec::with_capacity(raw.files.len());
    for file in raw.files {
        if file.path.is_empty() {
            return Err(missing("files[].path"));
        }
        let mode = match file.mode {
            None => Ok(DEFAULT_FILE_MODE),
            Some(ModeValue::Text(text)) => parse_mode(&text),
            Some(ModeValue::Number(value)) => mode_from_integer(value),
        }
        .map_err(|reason| ConfigError::InvalidMode {
            secret: name.clone(),
            path: file.path.clone(),
            reason,
        })?;
        files.push(FileTarget::new(file.path, mode));
    }

    let templates = raw
        .template
        .data
        .into_iter()
        .map(|(label, expression)| TemplateEntry::new(label, expression))
        .collect();

    let secret = Secret {
        name,
        key: raw.key,
        namespace: raw.namespace,
        mount_path,
        kv_version,
        refresh_interval,
        version: raw.version,
        templates,
        files,
    };

    SecretRenderer::new(&secret).map_err(|source| ConfigError::InvalidTemplate {
        secret: secret.name.clone(),
        source,
    })?;
    Ok(secret)
}

fn refresh_interval(secret: &str, value: Option<DurationValue>) -> Result<Duration, ConfigError> {
    let interval = match value {
        None => DEFAULT_REFRESH_INTERVAL,
        Some(DurationValue::Seconds(secs)) => Duration::from_secs(secs),
        Some(DurationValue::Text(text)) => {
            parse_duration(&text).map_err(|reason| ConfigError::InvalidDuration {
                secret: secret.to_string(),
                value: text.clone(),
                reason,
            })?
        }
    };
    if interval.is_zero() {
        return Err(ConfigError::NonPositiveInterval {
            secret: secret.to_string(),
        });
    }
    Ok(interval)
}

fn parse_kv_version(scope: &str, value: &str) -> Result<KvVersion, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidKvVersion {
        scope: scope.to_string(),
        value: value.to_string(),
    })
}

fn optional_path(value: String) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}
