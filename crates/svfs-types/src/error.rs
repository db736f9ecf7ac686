use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// POSIX-style error code attached to every filesystem failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// `ENOENT`: the path is not present.
    NotFound,
    /// `EISDIR`: a file was expected but a directory was found.
    IsDirectory,
    /// `ENOTDIR`: a directory was expected but a file was found.
    NotDirectory,
    /// Anything else (I/O failures of the backing storage).
    Unknown,
}

impl ErrorCode {
    /// The symbolic code, e.g. `"ENOENT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "ENOENT",
            Self::IsDirectory => "EISDIR",
            Self::NotDirectory => "ENOTDIR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Numeric errno as reported on Linux; `-10000` for unknown failures.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::IsDirectory => 21,
            Self::NotDirectory => 20,
            Self::Unknown => -10000,
        }
    }

    /// Whether the failure is part of the closed set of recoverable codes
    /// that may be memoized by lookup caches.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by [`ReadOnlyFs`](crate::ReadOnlyFs) implementations.
///
/// Each variant records the operation that failed and the path it was
/// called with, mirroring the errors a host runtime would raise.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {op} '{path}'")]
    NotFound { op: &'static str, path: String },

    #[error("EISDIR: illegal operation on a directory, {op} '{path}'")]
    IsDirectory { op: &'static str, path: String },

    #[error("ENOTDIR: not a directory, {op} '{path}'")]
    NotDirectory { op: &'static str, path: String },

    #[error("UNKNOWN: {op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    pub fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        Self::NotFound {
            op,
            path: path.into(),
        }
    }

    pub fn is_directory(op: &'static str, path: impl Into<String>) -> Self {
        Self::IsDirectory {
            op,
            path: path.into(),
        }
    }

    /// Translate a host I/O error into the matching POSIX-coded variant.
    pub fn from_io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { op, path },
            std::io::ErrorKind::IsADirectory => Self::IsDirectory { op, path },
            std::io::ErrorKind::NotADirectory => Self::NotDirectory { op, path },
            _ => Self::Io { op, path, source },
        }
    }

    /// Machine-readable code of this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::IsDirectory { .. } => ErrorCode::IsDirectory,
            Self::NotDirectory { .. } => ErrorCode::NotDirectory,
            Self::Io { .. } => ErrorCode::Unknown,
        }
    }

    /// The path the failing operation was called with.
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path, .. }
            | Self::IsDirectory { path, .. }
            | Self::NotDirectory { path, .. }
            | Self::Io { path, .. } => path,
        }
    }

    /// The operation name, e.g. `"statSync"`.
    pub fn op(&self) -> &'static str {
        match self {
            Self::NotFound { op, .. }
            | Self::IsDirectory { op, .. }
            | Self::NotDirectory { op, .. }
            | Self::Io { op, .. } => op,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }
}

/// Result alias for filesystem capability operations.
pub type FsResult<T> = Result<T, FsError>;
