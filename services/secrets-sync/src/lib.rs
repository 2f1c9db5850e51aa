//! secrets-sync
//!
//! Periodically reads secrets from a Vault/OpenBao KV engine, renders them
//! through per-secret templates and writes the results to files with the
//! requested permissions.
//!
//! ## Pipeline
//!
//! Each secret runs its own loop: fetch, render, write. Files are replaced
//! atomically and only when their content changes.

pub mod cli;
pub mod config;
pub mod error;
pub mod materializer;
pub mod render;
pub mod scheduler;
pub mod secret;
pub mod shutdown;
pub mod template;

pub use config::{Config, ConfigError, SecretStoreConfig};
pub use error::{CycleError, RenderError, SchedulerError, Stage, WriteError};
pub use materializer::{FileMaterializer, StagedFile};
pub use render::{render, RenderedFile, SecretRenderer};
pub use scheduler::{CycleReport, CycleState, Scheduler, SchedulerOptions, SecretStatus};
pub use secret::{resolve_namespace, FileTarget, Secret, TemplateEntry};
pub use template::{Template, TemplateError};
