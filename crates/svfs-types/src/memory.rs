use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FsError, FsResult};
use crate::fs::ReadOnlyFs;
use crate::path::dirname;
use crate::stat::FileStat;

/// In-memory [`ReadOnlyFs`] keyed by virtual path.
///
/// Intended for tests and embedding. Inserting a file registers every
/// ancestor directory, the same way a mounted volume does.
#[derive(Clone, Debug, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file, creating its ancestor directories.
    pub fn insert_file(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        self.insert_dir(dirname(&path));
        self.files.insert(path, content.into());
    }

    /// Builder-style [`insert_file`](Self::insert_file).
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert_file(path, content);
        self
    }

    /// Register a directory and its ancestors.
    pub fn insert_dir(&mut self, path: impl Into<String>) {
        let mut dir = path.into();
        while self.dirs.insert(dir.clone()) {
            let parent = dirname(&dir).to_string();
            if parent == dir {
                break;
            }
            dir = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ReadOnlyFs for MemoryFs {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        if let Some(content) = self.files.get(path) {
            return Ok(content.clone());
        }
        if self.dirs.contains(path) {
            return Err(FsError::is_directory("readFileSync", path));
        }
        Err(FsError::not_found("readFileSync", path))
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        if let Some(content) = self.files.get(path) {
            return Ok(FileStat::File {
                size: content.len() as u64,
            });
        }
        if self.dirs.contains(path) {
            return Ok(FileStat::Directory);
        }
        Err(FsError::not_found("statSync", path))
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        if self.files.contains_key(path) || self.dirs.contains(path) {
            Ok(path.to_string())
        } else {
            Err(FsError::not_found("realpathSync", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn insert_registers_ancestors() {
        let fs = MemoryFs::new().with_file("/pkg/lib/x.js", "x");
        assert!(fs.stat("/pkg/lib").unwrap().is_dir());
        assert!(fs.stat("/pkg").unwrap().is_dir());
        assert!(fs.stat("/").unwrap().is_dir());
        assert_eq!(fs.stat("/pkg/lib/x.js").unwrap(), FileStat::File { size: 1 });
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn reading_a_directory_is_eisdir() {
        let fs = MemoryFs::new().with_file("/pkg/a", "a");
        let err = fs.read_bytes("/pkg").unwrap_err();
        assert_eq!(err.code(), ErrorCode::IsDirectory);
    }

    #[test]
    fn missing_paths_are_enoent() {
        let fs = MemoryFs::new();
        assert!(fs.is_empty());
        assert_eq!(fs.stat("/nope").unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(fs.realpath("/nope").unwrap_err().op(), "realpathSync");
    }
}
