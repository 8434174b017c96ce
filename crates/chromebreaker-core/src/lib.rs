//! ChromeBreaker Core Library
//!
//! This crate provides the error type, the resource-type catalogue and the
//! export option record shared across all ChromeBreaker components.

pub mod config;
pub mod error;
pub mod types;

pub use config::ExportOptions;
pub use error::{Error, Result, ResultExt};
pub use types::*;
