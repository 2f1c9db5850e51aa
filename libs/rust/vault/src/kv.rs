//! KV engine addressing and fetch types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// KV secrets engine version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KvVersion {
    /// Flat, unversioned key/value engine
    #[serde(rename = "v1")]
    V1,
    /// Versioned engine with history and soft delete
    #[default]
    #[serde(rename = "v2")]
    V2,
}

impl KvVersion {
    /// The configuration spelling of this version.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown KV version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid kvVersion {0:?}: must be \"v1\" or \"v2\"")]
pub struct ParseKvVersionError(pub String);

impl FromStr for KvVersion {
    type Err = ParseKvVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(ParseKvVersionError(other.to_string())),
        }
    }
}

/// One read against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Path of the secret inside the mount
    pub path: String,
    /// Mount path of the KV engine
    pub mount_path: String,
    /// Namespace to send; empty means none
    pub namespace: String,
    /// Engine version at the mount
    pub kv_version: KvVersion,
    /// Pinned version (KV v2 only); `None` reads the latest
    pub version: Option<u64>,
}

impl FetchRequest {
    /// Create a request for the latest version of `path` under `mount_path`.
    #[must_use]
    pub fn new(mount_path: impl Into<String>, path: impl Into<String>, kv_version: KvVersion) -> Self {
        Self {
            path: path.into(),
            mount_path: mount_path.into(),
            namespace: String::new(),
            kv_version,
            version: None,
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Pin a KV v2 version.
    #[must_use]
    pub const fn with_version(mut self, version: Option<u64>) -> Self {
        self.version = version;
        self
    }

    /// API path relative to `/v1/`, including the version query for pinned v2 reads.
    ///
    /// v1 reads `<mount>/<path>`, v2 reads `<mount>/data/<path>`.
    #[must_use]
    pub fn api_path(&self) -> String {
        let mount = self.mount_path.trim_matches('/');
        let path = self.path.trim_matches('/');
        match self.kv_version {
            KvVersion::V1 => format!("{mount}/{path}"),
            KvVersion::V2 => match self.version {
                Some(version) => format!("{mount}/data/{path}?version={version}"),
                None => format!("{mount}/data/{path}"),
            },
        }
    }
}

/// Version token attached to a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecretVersion {
    /// KV v1 secrets carry no version
    #[default]
    Unversioned,
    /// KV v2 metadata version
    Version(u64),
}

impl fmt::Display for SecretVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unversioned => f.write_str("unversioned"),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}

/// Values read from one secret at one point in time.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct FetchResult {
    /// Field name to raw value
    pub values: BTreeMap<String, String>,
    /// Version the values belong to
    pub version: SecretVersion,
}

impl FetchResult {
    /// Create a result from field/value pairs.
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>, version: SecretVersion) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            version,
        }
    }

    /// Look up one field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

impl fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResult")
            .field("fields", &self.values.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}
