//! YAML document shape, before defaults and validation.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawConfig {
    #[serde(default)]
    pub secret_store: RawSecretStore,
    #[serde(default)]
    pub secrets: Vec<RawSecret>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RawSecretStore {
    pub address: String,
    pub auth_method: String,
    pub token: String,
    pub role_id: String,
    pub secret_id: String,
    pub kv_version: Option<String>,
    pub mount_path: Option<String>,
    pub namespace: String,
    #[serde(rename = "tlsCACert")]
    pub tls_ca_cert: String,
    #[serde(rename = "tlsCAPath")]
    pub tls_ca_path: String,
    pub tls_skip_verify: bool,
    pub tls_client_cert: String,
    pub tls_client_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RawSecret {
    pub name: String,
    #[serde(alias = "path")]
    pub key: String,
    pub namespace: String,
    pub mount_path: Option<String>,
    pub kv_version: Option<String>,
    pub refresh_interval: Option<DurationValue>,
    pub version: Option<u64>,
    pub template: RawTemplate,
    pub files: Vec<RawFile>,
}

/// A duration written as text (`"30m"`) or as whole seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum DurationValue {
    Text(String),
    Seconds(u64),
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawTemplate {
    #[serde(default, deserialize_with = "ordered_entries")]
    pub data: Vec<(String, String)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawFile {
    pub path: String,
    pub mode: Option<ModeValue>,
}

/// A mode written as an octal string (`"0644"`) or an integer (`644`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum ModeValue {
    Text(String),
    Number(u64),
}

// Keeps mapping entries in document order; positional file binding relies on it.
fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of template labels to template expressions")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, String>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}
