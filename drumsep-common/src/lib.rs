//! # drumsep common library
//!
//! Shared code for the drumsep binaries:
//! - Common error and result types
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Output folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
