use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed archive {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("{field} does not fit a 48-bit field: {value}")]
    ValueOutOfRange { field: &'static str, value: i128 },

    #[error("source {path:?} changed while packing: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("file name is not valid UTF-8: {path:?}")]
    InvalidName { path: PathBuf },

    #[error("entry name must not be empty")]
    EmptyName,
}

impl ArchiveError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
