use std::path::{Path, PathBuf};

use svfs_types::path::unixify_path;
use svfs_types::{Encoding, FileStat, FsError, FsResult, ReadOnlyFs};
use tracing::{debug, warn};

use crate::error::ArchiveResult;
use crate::volume::{IndexEntry, Volume};

/// A successful [`VolumeStack::lookup`].
#[derive(Clone, Copy, Debug)]
pub struct Lookup<'a> {
    pub volume: &'a Volume,
    pub entry: &'a IndexEntry,
}

/// Ordered set of mounted volumes presenting one unioned, read-only tree.
///
/// Lookups walk the volumes in mount order and stop at the first one that
/// knows the path, so the earliest mounted volume shadows later ones.
#[derive(Debug, Default)]
pub struct VolumeStack {
    volumes: Vec<Volume>,
}

impl VolumeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount the archive at `path`. Returns `false` if that archive was
    /// already mounted, in which case nothing changes.
    pub fn mount(&mut self, path: impl AsRef<Path>) -> ArchiveResult<bool> {
        let source = canonical(path.as_ref());
        if self.position(&source).is_some() {
            debug!(path = %source.display(), "volume already mounted");
            return Ok(false);
        }
        let volume = Volume::open(&source)?;
        debug!(
            path = %source.display(),
            position = self.volumes.len(),
            "volume mounted"
        );
        self.volumes.push(volume);
        Ok(true)
    }

    /// Shut down and remove the volume for `path`. Returns whether one was
    /// mounted.
    pub fn unmount(&mut self, path: impl AsRef<Path>) -> bool {
        let source = canonical(path.as_ref());
        match self.position(&source) {
            Some(idx) => {
                let mut volume = self.volumes.remove(idx);
                volume.shutdown();
                debug!(path = %source.display(), "volume unmounted");
                true
            }
            None => {
                warn!(path = %source.display(), "unmount of a volume that is not mounted");
                false
            }
        }
    }

    /// First volume, in mount order, whose index holds `path`.
    pub fn lookup(&self, path: &str) -> Option<Lookup<'_>> {
        let target = unixify_path(path);
        self.volumes.iter().find_map(|volume| {
            volume
                .entry(&target)
                .map(|entry| Lookup { volume, entry })
        })
    }

    pub fn read_bytes_sync(&self, path: &str) -> FsResult<&[u8]> {
        const OP: &str = "readFileSync";
        let hit = self
            .lookup(path)
            .ok_or_else(|| FsError::not_found(OP, path))?;
        if hit.entry.is_dir() {
            return Err(FsError::is_directory(OP, path));
        }
        hit.volume
            .read_bytes(&unixify_path(path))
            .ok_or_else(|| FsError::not_found(OP, path))
    }

    pub fn read_file_sync(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        self.read_bytes_sync(path).map(|bytes| encoding.decode(bytes))
    }

    pub fn stat_sync(&self, path: &str) -> FsResult<FileStat> {
        self.lookup(path)
            .map(|hit| hit.entry.stat())
            .ok_or_else(|| FsError::not_found("statSync", path))
    }

    /// Virtual paths are already canonical; this only normalizes separators.
    pub fn realpath_sync(&self, path: &str) -> FsResult<String> {
        match self.lookup(path) {
            Some(_) => Ok(unixify_path(path)),
            None => Err(FsError::not_found("realpathSync", path)),
        }
    }

    /// Union of every volume's registered paths, duplicates included.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().flat_map(Volume::entries)
    }

    /// Each mounted volume's hash, in mount order.
    pub fn hashes(&self) -> Vec<&str> {
        self.volumes.iter().map(Volume::hash).collect()
    }

    /// Canonical source path of each mounted volume, in mount order.
    pub fn mounted_paths(&self) -> Vec<&Path> {
        self.volumes.iter().map(Volume::source_path).collect()
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Shut down and drop every volume.
    pub fn shutdown(&mut self) {
        for volume in &mut self.volumes {
            volume.shutdown();
        }
        self.volumes.clear();
    }

    fn position(&self, source: &Path) -> Option<usize> {
        self.volumes.iter().position(|v| v.source_path() == source)
    }
}

impl ReadOnlyFs for VolumeStack {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        self.read_bytes_sync(path).map(<[u8]>::to_vec)
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        self.stat_sync(path)
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        self.realpath_sync(path)
    }

    fn read_file(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        self.read_file_sync(path, encoding)
    }
}

/// Resolve symlinks when the file exists; otherwise settle for an absolute
/// path so a deleted archive can still be unmounted.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
