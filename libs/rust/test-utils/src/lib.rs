//! Shared test utilities for secrets-sync.
//!
//! This crate provides:
//! - Proptest generators for secret fields, values, namespaces and modes
//! - A scripted in-memory secret store
//! - Test fixtures with sample secrets and configuration files

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::{MockFailure, MockSecretStore};
