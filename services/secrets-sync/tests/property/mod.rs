//! Property Tests Module
//!
//! Structure:
//! - template: rendering of generated templates
//! - namespace: namespace resolution
//! - values: duration and mode parsing

pub mod namespace;
pub mod template;
pub mod values;
