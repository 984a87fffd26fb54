//! Centralized error types for mailformat.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailformat library.
///
/// Very few of these ever reach a caller of [`Parser::parse`]: decomposition
/// failures are recovered into error parts and only sink I/O surfaces from
/// [`Formatter::format`].
///
/// [`Parser::parse`]: crate::parser::Parser::parse
/// [`Formatter::format`]: crate::formatter::Formatter::format
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The input could not be read as a MIME message at all.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// A signature could not be verified or content could not be decrypted.
    #[error("Cipher error: {0}")]
    Cipher(String),
}

/// Convenience alias for `Result<T, FormatError>`.
pub type Result<T> = std::result::Result<T, FormatError>;

impl FormatError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Sink writes have no path; they are reported against `<sink>`.
impl From<std::io::Error> for FormatError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<sink>"),
            source,
        }
    }
}
