//! Loader error definitions.
//!
//! This module defines the failure conditions surfaced by every parser and loader entry point. It provides:
//! 1. **Taxonomy:** Structural, integrity, range, symbol lookup and I/O failures as distinct variants.
//! 2. **Inspection:** A flat [`ErrorKind`] for matching without destructuring payloads.
//! 3. **Conversion:** Helpers used by the parsers to build errors with formatted context.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the loader.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Failure raised while validating or loading a program image.
///
/// None of these conditions are recoverable: the simulation driver is expected to
/// abort the run when a load fails.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Structural violation in the image: bad magic, truncated or inconsistent
    /// headers, overlapping segments, out-of-file offsets.
    #[error("malformed image: {0}")]
    Format(String),

    /// Checksum mismatch on otherwise well-structured data.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A computed destination falls outside the address space or the regions
    /// the memory sink accepts.
    #[error("address range {address:#x}+{length:#x} rejected: {reason}")]
    Range {
        /// First byte of the rejected range.
        address: u64,
        /// Length of the rejected range in bytes.
        length: u64,
        /// Why the range was rejected.
        reason: String,
    },

    /// The symbol table is well formed but holds no entry with this name.
    #[error("symbol `{0}` not found")]
    SymbolNotFound(String),

    /// The image file could not be opened or fully read.
    #[error("could not read `{}`: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Discriminant of a [`LoadError`], for callers that only care about the class of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`LoadError::Format`].
    Format,
    /// See [`LoadError::Integrity`].
    Integrity,
    /// See [`LoadError::Range`].
    Range,
    /// See [`LoadError::SymbolNotFound`].
    SymbolNotFound,
    /// See [`LoadError::Io`].
    Io,
}

impl LoadError {
    /// Builds a [`LoadError::Format`] from anything printable.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Builds a [`LoadError::Integrity`] from anything printable.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Builds a [`LoadError::Range`] for `length` bytes at `address`.
    pub fn range(address: u64, length: u64, reason: impl Into<String>) -> Self {
        Self::Range {
            address,
            length,
            reason: reason.into(),
        }
    }

    /// Wraps an I/O failure on `path`.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the class of this failure.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Range { .. } => ErrorKind::Range,
            Self::SymbolNotFound(_) => ErrorKind::SymbolNotFound,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<object::read::Error> for LoadError {
    fn from(err: object::read::Error) -> Self {
        Self::Format(err.to_string())
    }
}
