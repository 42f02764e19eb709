//! Error types for voxcrate

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for voxcrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty result: no points of {source_name} fall inside the voxel grid")]
    EmptyResult { source_name: String },

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of [`Error`] values, used by callers that apply a
/// skip-or-abort policy per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    MalformedInput,
    InvalidConfig,
    EmptyResult,
    UnknownLabel,
    InvalidData,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Io => "io error",
            ErrorKind::MalformedInput => "malformed input",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::EmptyResult => "empty result",
            ErrorKind::UnknownLabel => "unknown label",
            ErrorKind::InvalidData => "invalid data",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Wrap an I/O error together with the path it happened on
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::FileAccess { .. } => ErrorKind::Io,
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::EmptyResult { .. } => ErrorKind::EmptyResult,
            Error::UnknownLabel(_) => ErrorKind::UnknownLabel,
            Error::InvalidData(_) | Error::Serialization(_) => ErrorKind::InvalidData,
        }
    }

    /// Whether the error should stop a whole dataset run regardless of policy
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io | ErrorKind::InvalidConfig)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for voxcrate operations
pub type Result<T> = std::result::Result<T, Error>;
