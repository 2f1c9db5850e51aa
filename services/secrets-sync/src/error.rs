//! Error types for the refresh pipeline using thiserror 2.0.

use crate::template::TemplateError;
use std::io;
use std::path::PathBuf;
use sync_vault_client::VaultError;
use thiserror::Error;

/// Rendering failures, tagged with the template label.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Template source could not be parsed
    #[error("template {label:?}: syntax error at byte {offset}: {reason}")]
    TemplateSyntax {
        /// Template label
        label: String,
        /// Byte offset of the offending action
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// Template references a field the secret lacks
    #[error("template {label:?}: field {field:?} not present in secret")]
    MissingField {
        /// Template label
        label: String,
        /// Missing field
        field: String,
    },
}

impl RenderError {
    /// Attach a template label to a template error.
    #[must_use]
    pub fn from_template(label: &str, err: TemplateError) -> Self {
        match err {
            TemplateError::Syntax { offset, reason } => Self::TemplateSyntax {
                label: label.to_string(),
                offset,
                reason,
            },
            TemplateError::MissingField { field } => Self::MissingField {
                label: label.to_string(),
                field,
            },
        }
    }
}

/// Failures writing a target file.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Filesystem refused access
    #[error("permission denied writing {path}: {source}")]
    PermissionDenied {
        /// Target path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// No space left
    #[error("disk full writing {path}: {source}")]
    DiskFull {
        /// Target path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Any other reason the path cannot be written
    #[error("cannot write {path}: {source}")]
    PathNotWritable {
        /// Target path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

impl WriteError {
    /// Classify an I/O error raised while writing `path`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            io::ErrorKind::StorageFull => Self::DiskFull { path, source },
            // EDQUOT
            _ if source.raw_os_error() == Some(122) => Self::DiskFull { path, source },
            _ => Self::PathNotWritable { path, source },
        }
    }

    /// Target path of the failed write.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied { path, .. }
            | Self::DiskFull { path, .. }
            | Self::PathNotWritable { path, .. } => path,
        }
    }
}

/// Stage of a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading from the store
    Fetch,
    /// Evaluating templates
    Render,
    /// Writing files
    Write,
}

impl Stage {
    /// Stable lowercase name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Render => "render",
            Self::Write => "write",
        }
    }
}

/// A failed refresh cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    /// Fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] VaultError),

    /// Rendering failed
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// One or more files could not be written; holds the first failure
    #[error("{failed} of {total} files not written: {first}")]
    Write {
        /// First failure
        first: WriteError,
        /// Number of failed files
        failed: usize,
        /// Number of files in the secret
        total: usize,
    },

    /// Blocking write task did not complete
    #[error("write task aborted: {0}")]
    WriteTask(String),

    /// Shutdown requested while the cycle was in flight
    #[error("cycle cancelled by shutdown")]
    Cancelled,

    /// The task running the cycle panicked
    #[error("cycle task panicked: {0}")]
    Panicked(String),
}

impl CycleError {
    /// Stage the cycle failed in, if it failed in one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Fetch(_) => Some(Stage::Fetch),
            Self::Render(_) => Some(Stage::Render),
            Self::Write { .. } | Self::WriteTask(_) => Some(Stage::Write),
            Self::Cancelled | Self::Panicked(_) => None,
        }
    }
}

/// Scheduler lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Nothing to schedule
    #[error("no secrets configured")]
    NoSecrets,

    /// `start` called twice
    #[error("scheduler already started")]
    AlreadyStarted,

    /// A secret has a zero refresh interval
    #[error("secret {secret}: refresh interval must be greater than 0")]
    ZeroInterval {
        /// Secret name
        secret: String,
    },
}
