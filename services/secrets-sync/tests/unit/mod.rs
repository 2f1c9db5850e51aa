//! Unit Tests Module
//!
//! Structure:
//! - config: loading, defaults and every validation rule
//! - materializer: idempotent and atomic writes

pub mod config;
pub mod materializer;
