//! Vault response wire types.

use serde::Deserialize;
use serde_json::{Map, Value};

/// KV v1 read response.
#[derive(Debug, Deserialize)]
pub struct KvV1Response {
    /// Secret fields
    pub data: Option<Map<String, Value>>,
}

/// KV v2 read response.
#[derive(Debug, Deserialize)]
pub struct KvV2Response {
    /// Envelope holding fields and metadata
    pub data: Option<KvV2Data>,
}

/// KV v2 data envelope.
#[derive(Debug, Deserialize)]
pub struct KvV2Data {
    /// Secret fields; `null` when the version is deleted or destroyed
    pub data: Option<Map<String, Value>>,
    /// Version metadata
    pub metadata: Option<KvMetadata>,
}

/// KV v2 version metadata.
#[derive(Debug, Default, Deserialize)]
pub struct KvMetadata {
    /// Creation timestamp
    #[serde(default)]
    pub created_time: String,
    /// Soft-delete timestamp, empty when live
    #[serde(default)]
    pub deletion_time: String,
    /// Whether the version has been destroyed
    #[serde(default)]
    pub destroyed: bool,
    /// Version number
    #[serde(default)]
    pub version: u64,
}

impl KvMetadata {
    /// Whether this version is soft-deleted or destroyed.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.destroyed || !self.deletion_time.is_empty()
    }
}

/// Vault auth response.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Login result
    pub auth: AuthData,
}

/// Login result.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Issued token
    pub client_token: String,
    /// Token TTL in seconds; 0 means no expiry
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the token can be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Vault error body.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    /// Error messages
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Flatten secret fields into strings.
///
/// Strings are taken verbatim, `null` becomes empty, anything else is
/// rendered as compact JSON.
#[must_use]
pub fn stringify_fields(fields: Map<String, Value>) -> Vec<(String, String)> {
    fields
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, text)
        })
        .collect()
}
