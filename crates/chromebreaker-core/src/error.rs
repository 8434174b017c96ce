//! Unified error handling for ChromeBreaker
//!
//! Parser errors convert into [`Error`] at crate boundaries. The variants
//! follow the extraction pipeline's error classes; the skip, fallback and
//! abort decisions themselves are made on the parser error kind.

use thiserror::Error;

/// Unified error type for all ChromeBreaker operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad chunk sizes, short records, wrong magic; fatal to the file
    #[error("Structural error at offset {offset}: {message}")]
    Structural { offset: u64, message: String },

    /// Offset or size outside the file, section or mesh image
    #[error("Out of bounds: {message}")]
    OutOfBounds { message: String },

    /// Decoder failure; the section is unavailable
    #[error("Decompression failed: {message}")]
    DecompressionFailed { message: String },

    /// Layout id, part count or codec this build does not decode
    #[error("Unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// Broken API contract, e.g. closing a chunk that was never opened
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Export failed: {message}")]
    ExportFailed { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap with a description of what was being done
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Error::ExportFailed { message: message.into() }
    }
}

/// Context helpers for [`Result`]
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Lazily built context
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
