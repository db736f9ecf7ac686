use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::path::unixify_path;
use crate::stat::FileStat;

/// Text encoding applied when reading a file as a string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8; invalid sequences become U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Minimal synchronous read-only filesystem.
///
/// This is the whole surface the module resolver consumes. Implementations:
/// - must report absence with a recoverable [`FsError`](crate::FsError)
///   (`ENOENT`, `EISDIR`, `ENOTDIR`), never with a panic;
/// - must be side-effect free: probing a path never changes what later
///   probes observe.
pub trait ReadOnlyFs {
    /// Raw content of the file at `path`.
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Metadata for `path`.
    fn stat(&self, path: &str) -> FsResult<FileStat>;

    /// Canonical form of `path`.
    fn realpath(&self, path: &str) -> FsResult<String>;

    /// Content of the file at `path`, decoded with `encoding`.
    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        Ok(encoding.decode(&self.read_bytes(path)?))
    }
}

impl<T: ReadOnlyFs + ?Sized> ReadOnlyFs for &T {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        (**self).read_bytes(path)
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        (**self).stat(path)
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        (**self).realpath(path)
    }

    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        (**self).read_file(path, encoding)
    }
}

impl<T: ReadOnlyFs + ?Sized> ReadOnlyFs for Box<T> {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        (**self).read_bytes(path)
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        (**self).stat(path)
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        (**self).realpath(path)
    }

    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        (**self).read_file(path, encoding)
    }
}

impl<T: ReadOnlyFs + ?Sized> ReadOnlyFs for Arc<T> {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        (**self).read_bytes(path)
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        (**self).stat(path)
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        (**self).realpath(path)
    }

    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        (**self).read_file(path, encoding)
    }
}

/// Adapter that rewrites every incoming path with [`unixify_path`] before
/// delegating, so `C:\node_modules\a.js` reaches the inner filesystem as
/// `/node_modules/a.js`.
#[derive(Clone, Debug)]
pub struct Unixified<F>(pub F);

impl<F: ReadOnlyFs> ReadOnlyFs for Unixified<F> {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        self.0.read_bytes(&unixify_path(path))
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        self.0.stat(&unixify_path(path))
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        self.0.realpath(&unixify_path(path))
    }

    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        self.0.read_file(&unixify_path(path), encoding)
    }
}
