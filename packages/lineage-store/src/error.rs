//! Error types for lineage-store

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Value codec framing errors (unknown tag, truncated stream)
    Codec,
    /// Magic header mismatch. Callers may treat the file as absent.
    FormatNotRecognized,
    /// I/O errors
    IO,
    /// Advisory lock could not be taken or released
    Lock,
    /// Rebuild / swap failure
    Commit,
    /// Path refused by the directory allow-list
    PathRejected,
    /// Record or string index out of range
    NotFound,
    /// Configuration errors
    Config,
    /// Structurally invalid on-disk data (bad offsets, wrong shapes)
    Corrupted,
    /// Another writer committed since this handle read the base
    Stale,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Codec => "codec",
            ErrorKind::FormatNotRecognized => "format_not_recognized",
            ErrorKind::IO => "io",
            ErrorKind::Lock => "lock",
            ErrorKind::Commit => "commit",
            ErrorKind::PathRejected => "path_rejected",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Config => "config",
            ErrorKind::Corrupted => "corrupted",
            ErrorKind::Stale => "stale",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn codec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Codec, message)
    }

    pub fn format_not_recognized(found: &[u8], expected: &[u8]) -> Self {
        Self::new(
            ErrorKind::FormatNotRecognized,
            format!(
                "Format not recognized: found {:?}, expected {:?}",
                String::from_utf8_lossy(found),
                String::from_utf8_lossy(expected)
            ),
        )
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IO, message)
    }

    pub fn lock(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lock, message)
    }

    pub fn commit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Commit, message)
    }

    pub fn path_rejected(path: impl fmt::Debug) -> Self {
        Self::new(
            ErrorKind::PathRejected,
            format!("Path rejected by safe directory check: {:?}", path),
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, format!("Not found: {}", what.into()))
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupted, message)
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Stale, message)
    }

    /// True for the magic-mismatch case, the only condition callers may
    /// downgrade to "absent".
    pub fn is_format_not_recognized(&self) -> bool {
        self.kind == ErrorKind::FormatNotRecognized
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return StorageError::codec(format!("Truncated stream: {}", err)).with_source(err);
        }
        StorageError::io(format!("I/O error: {}", err)).with_source(err)
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::new(ErrorKind::Config, err.to_string()).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
