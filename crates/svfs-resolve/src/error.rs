use svfs_types::FsError;
use thiserror::Error;

/// Errors from resolution and module loading.
///
/// Not finding a module is not an error for [`Resolver::resolve`](crate::Resolver::resolve);
/// only the translating helpers produce [`ResolveError::ModuleNotFound`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Fatal failure of the underlying filesystem.
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("Error parsing {path}: {source}")]
    MalformedDescriptor {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: {source}")]
    MalformedDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot find module '{specifier}'")]
    ModuleNotFound { specifier: String },

    #[error("no extension handler registered for '{filename}'")]
    NoHandler { filename: String },
}

impl ResolveError {
    /// The path the failure concerns, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fs(err) => Some(err.path()),
            Self::MalformedDescriptor { path, .. } | Self::MalformedDocument { path, .. } => {
                Some(path)
            }
            Self::ModuleNotFound { .. } => None,
            Self::NoHandler { filename } => Some(filename),
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
