// chromebreaker-parsers/src/traits.rs
//! Core traits defining the parser interface for all file formats.
//!
//! This module establishes the shared parsing vocabulary:
//! - one error type classified into the pipeline's error classes
//! - an explicit `Outcome` for skip-versus-abort decisions
//! - the `Parser` trait with path-based parsing on top of any reader

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

use crate::binary::read_fully;
use crate::source::FileSource;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    /// Bad framing: chunk sizes, short records, malformed tables
    #[error("Structural error at offset {offset}: {message}")]
    Structural { offset: u64, message: String },

    /// Offset or length beyond the containing file, section or image
    #[error("Out of bounds: {len} bytes at offset {offset} exceed limit {limit}")]
    OutOfBounds { offset: u64, len: u64, limit: u64 },

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// Layout id, part count or tag this build does not decode
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// API misuse, e.g. closing a chunk that was never opened
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

/// Error classes used to pick a recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal to the current file
    Structural,
    /// Skip the affected resource or part
    Bounds,
    /// Mark the section unavailable
    Decompression,
    /// Fall back to a raw dump of the resource
    UnsupportedFormat,
    /// A bug; never caught
    Invariant,
    /// Underlying stream failure
    Io,
}

impl ErrorKind {
    /// Whether the error ends processing of the whole file rather than
    /// one part or resource
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Structural | ErrorKind::Invariant | ErrorKind::Io)
    }

    /// Whether a failed conversion may still be written as raw parts.
    ///
    /// Structural errors here come from the resource's own bytes, so they
    /// stay local to that resource.
    pub fn allows_raw_fallback(self) -> bool {
        !matches!(self, ErrorKind::Invariant | ErrorKind::Io)
    }
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a structural error
    pub fn structural(offset: u64, message: impl Into<String>) -> Self {
        ParseError::Structural {
            offset,
            message: message.into(),
        }
    }

    /// Classify the error, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Io(_) => ErrorKind::Io,
            ParseError::InvalidMagic { .. } | ParseError::Structural { .. } => ErrorKind::Structural,
            ParseError::OutOfBounds { .. } => ErrorKind::Bounds,
            ParseError::DecompressionFailed(_) => ErrorKind::Decompression,
            ParseError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ParseError::Invariant(_) => ErrorKind::Invariant,
            ParseError::Nested { source, .. } => source.kind(),
        }
    }
}

impl From<ParseError> for chromebreaker_core::Error {
    fn from(err: ParseError) -> Self {
        use chromebreaker_core::Error;

        match err {
            ParseError::Io(e) => Error::Io(e),
            ParseError::InvalidMagic { expected, found } => Error::Structural {
                offset: 0,
                message: format!("invalid magic: expected {expected:?}, found {found:?}"),
            },
            ParseError::Structural { offset, message } => Error::Structural { offset, message },
            e @ ParseError::OutOfBounds { .. } => Error::OutOfBounds { message: e.to_string() },
            ParseError::DecompressionFailed(message) => Error::DecompressionFailed { message },
            ParseError::UnsupportedFormat(message) => Error::UnsupportedFormat { message },
            ParseError::Invariant(message) => Error::Internal { message },
            ParseError::Nested { context, source } => Error::from(*source).with_context(context),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Result of one step of a batch loop.
///
/// `Skip` drops the current item with a reason and lets the loop continue;
/// `Fatal` stops the whole file.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Skip(String),
    Fatal(ParseError),
}

impl<T> Outcome<T> {
    /// Sort a parse result into an outcome by error class
    pub fn from_result(result: ParseResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) if e.kind().is_fatal() => Outcome::Fatal(e),
            Err(e) => Outcome::Skip(e.to_string()),
        }
    }

    /// Whether this outcome carries a value
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }
}

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Require exact magic values where the format has one
    pub strict_validation: bool,
    /// Skip unknown chunk types instead of erroring
    pub skip_unknown_chunks: bool,
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: false,
            skip_unknown_chunks: true,
            use_memory_mapping: true,
            memory_mapping_threshold: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// A reader for one Chrome Engine file format.
///
/// Implementors supply `parse_with_options`; path-based parsing and
/// format sniffing come for free.
pub trait Parser: Send + Sync {
    type Output: Send + Sync;

    /// Lower-case extensions without the dot
    fn extensions(&self) -> &[&str];

    /// Leading bytes every file of this format starts with
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn name(&self) -> &str;

    fn parse<R: Read + Seek>(&self, reader: R) -> ParseResult<Self::Output> {
        self.parse_with_options(reader, &ParseOptions::default())
    }

    fn parse_with_options<R: Read + Seek>(&self, reader: R, options: &ParseOptions) -> ParseResult<Self::Output>;

    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse a file through a [`FileSource`]
    fn parse_file_with_options(&self, path: &Path, options: &ParseOptions) -> ParseResult<Self::Output> {
        self.parse_with_options(FileSource::open(path, options)?, options)
    }

    /// Whether `path` looks like this format, by extension or leading magic
    fn can_parse(&self, path: &Path) -> bool {
        let by_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)));
        if by_extension {
            return true;
        }

        let Some(magic) = self.magic_bytes() else {
            return false;
        };
        let Ok(mut file) = std::fs::File::open(path) else {
            return false;
        };
        let mut head = vec![0u8; magic.len()];
        matches!(read_fully(&mut file, &mut head), Ok(n) if n == magic.len() && head == magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::InvalidMagic {
            expected: vec![0x4D, 0x53, 0x48],
            found: vec![0x00, 0x00, 0x00],
        };

        let contextualized = error.with_context("parsing header");

        match contextualized {
            ParseError::Nested { context, .. } => {
                assert_eq!(context, "parsing header");
            }
            _ => panic!("Expected Nested error"),
        }
    }

    #[test]
    fn test_kind_looks_through_context() {
        let err = ParseError::UnsupportedFormat("layout 9".into())
            .with_context("node 2")
            .with_context("mesh.msh");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_outcome_classification() {
        let skip: Outcome<()> = Outcome::from_result(Err(ParseError::OutOfBounds {
            offset: 10,
            len: 4,
            limit: 12,
        }));
        assert!(matches!(skip, Outcome::Skip(_)));

        let fatal: Outcome<()> = Outcome::from_result(Err(ParseError::structural(0, "short chunk")));
        assert!(matches!(fatal, Outcome::Fatal(_)));

        assert!(Outcome::from_result(Ok(5)).is_ok());
    }

    #[test]
    fn test_kind_policies() {
        use ErrorKind::*;

        let fatal: Vec<_> = [Structural, Bounds, Decompression, UnsupportedFormat, Invariant, Io]
            .into_iter()
            .filter(|k| k.is_fatal())
            .collect();
        assert_eq!(fatal, [Structural, Invariant, Io]);

        for kind in [Structural, Bounds, Decompression, UnsupportedFormat] {
            assert!(kind.allows_raw_fallback(), "{kind:?}");
        }
        assert!(!Invariant.allows_raw_fallback());
        assert!(!Io.allows_raw_fallback());
    }

    #[test]
    fn test_decompression_error_is_skipped() {
        let outcome: Outcome<()> = Outcome::from_result(Err(ParseError::DecompressionFailed("bad stream".into())));
        assert!(matches!(outcome, Outcome::Skip(reason) if reason.contains("bad stream")));
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: chromebreaker_core::Error =
            ParseError::Invariant("end() with no open chunk".into()).with_context("writer").into();
        assert!(err.to_string().contains("writer"));
        let chromebreaker_core::Error::WithContext { source, .. } = err else {
            panic!("expected context wrapper");
        };
        assert!(matches!(*source, chromebreaker_core::Error::Internal { .. }));
    }
}
