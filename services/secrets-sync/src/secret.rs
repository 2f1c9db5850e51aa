//! Validated secret descriptors.
//!
//! A [`Secret`] is built once from configuration and shared read-only with
//! its refresh task for the life of the process.

use std::path::PathBuf;
use std::time::Duration;
use sync_vault_client::{FetchRequest, KvVersion};

/// One template expression and the label it was declared under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Label from `template.data`; informational only
    pub label: String,
    /// Template source
    pub expression: String,
}

impl TemplateEntry {
    /// Create an entry.
    pub fn new(label: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expression: expression.into(),
        }
    }
}

/// A file the secret is materialized into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    /// Destination path
    pub path: PathBuf,
    /// Permission bits
    pub mode: u32,
}

impl FileTarget {
    /// Create a target.
    pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// A secret to keep in sync.
///
/// `templates` and `files` have the same length; the Nth template renders into
/// the Nth file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    /// Unique label used in logs and status
    pub name: String,
    /// Path of the secret inside the mount
    pub key: String,
    /// Per-secret namespace; empty defers to the store namespace
    pub namespace: String,
    /// KV mount path
    pub mount_path: String,
    /// KV engine version
    pub kv_version: KvVersion,
    /// Time between refresh cycles
    pub refresh_interval: Duration,
    /// Pinned KV v2 version
    pub version: Option<u64>,
    /// Templates in declaration order
    pub templates: Vec<TemplateEntry>,
    /// Target files in declaration order
    pub files: Vec<FileTarget>,
}

impl Secret {
    /// Namespace this secret is read from.
    #[must_use]
    pub fn resolve_namespace<'a>(&'a self, global: &'a str) -> &'a str {
        resolve_namespace(&self.namespace, global)
    }

    /// Template/file pairs in positional order.
    pub fn bindings(&self) -> impl Iterator<Item = (&TemplateEntry, &FileTarget)> {
        self.templates.iter().zip(&self.files)
    }

    /// The store request for this secret.
    #[must_use]
    pub fn fetch_request(&self, global_namespace: &str) -> FetchRequest {
        FetchRequest::new(&self.mount_path, &self.key, self.kv_version)
            .with_namespace(self.resolve_namespace(global_namespace))
            .with_version(self.version)
    }
}

/// Pick the per-secret namespace when set, else the global one.
#[must_use]
pub fn resolve_namespace<'a>(secret_namespace: &'a str, global_namespace: &'a str) -> &'a str {
    if secret_namespace.is_empty() {
        global_namespace
    } else {
        secret_namespace
    }
}
