use std::collections::HashMap;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use svfs_types::path::dirname;
use svfs_types::{Encoding, FileStat};
use tracing::debug;

use crate::codec::ArchiveHeader;
use crate::error::{ArchiveError, ArchiveResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Location of one virtual path inside a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    pub length: u64,
    pub kind: EntryKind,
}

impl IndexEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn stat(&self) -> FileStat {
        match self.kind {
            EntryKind::File => FileStat::File { size: self.length },
            EntryKind::Directory => FileStat::Directory,
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Owned(bytes) => bytes,
        }
    }
}

/// One opened archive.
///
/// The whole index is parsed on open; payload bytes stay in the mapping and
/// are only paged in when read.
pub struct Volume {
    source_path: PathBuf,
    backing: Option<Backing>,
    hash: String,
    index: HashMap<String, IndexEntry>,
}

impl Volume {
    /// Open and index the archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| ArchiveError::io(path, e))?
            .len();
        if len == 0 {
            return Err(ArchiveError::malformed(path, "empty file"));
        }
        // SAFETY: archives are published once and never modified in place.
        // Truncating the file while it is mapped makes later payload reads
        // fault with SIGBUS instead of returning an error.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| ArchiveError::io(path, e))?;
        Self::load(path.to_path_buf(), Backing::Mapped(map))
    }

    /// Index an archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> ArchiveResult<Self> {
        Self::load(PathBuf::from("<memory>"), Backing::Owned(data))
    }

    fn load(source_path: PathBuf, backing: Backing) -> ArchiveResult<Self> {
        let header = ArchiveHeader::parse(&backing, &source_path)?;

        let mut index = HashMap::with_capacity(header.records.len() * 2);
        let mut offset = header.data_offset;
        for record in header.records {
            let entry = IndexEntry {
                offset,
                length: record.length,
                kind: EntryKind::File,
            };
            offset = offset.checked_add(record.length).ok_or_else(|| {
                ArchiveError::malformed(&source_path, "payload offsets overflow")
            })?;
            add_parent_dirs(&mut index, &record.name);
            index.insert(record.name, entry);
        }

        if offset > backing.len() as u64 {
            return Err(ArchiveError::malformed(
                &source_path,
                format!(
                    "index describes {offset} bytes but file holds {}",
                    backing.len()
                ),
            ));
        }

        debug!(
            path = %source_path.display(),
            entries = index.len(),
            hash = %header.hash,
            "volume opened"
        );

        Ok(Self {
            source_path,
            backing: Some(backing),
            hash: header.hash,
            index,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Hash recorded by the writer.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_open(&self) -> bool {
        self.backing.is_some()
    }

    pub fn entry(&self, path: &str) -> Option<&IndexEntry> {
        self.index.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn stat(&self, path: &str) -> Option<FileStat> {
        self.entry(path).map(IndexEntry::stat)
    }

    /// Every registered path, files and synthesized directories alike.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.index.values().filter(|e| !e.is_dir()).count()
    }

    /// Payload of a registered file, borrowed from the mapping.
    pub fn read_bytes(&self, path: &str) -> Option<&[u8]> {
        let entry = self.index.get(path).filter(|e| !e.is_dir())?;
        let data = self.backing.as_deref()?;
        let start = entry.offset as usize;
        data.get(start..start + entry.length as usize)
    }

    /// Decoded content of a registered file.
    pub fn read_file(&self, path: &str, encoding: Encoding) -> Option<String> {
        self.read_bytes(path).map(|bytes| encoding.decode(bytes))
    }

    /// Release the mapping and forget the index.
    pub fn shutdown(&mut self) {
        self.backing = None;
        self.index.clear();
        debug!(path = %self.source_path.display(), "volume shut down");
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("source_path", &self.source_path)
            .field("hash", &self.hash)
            .field("entries", &self.index.len())
            .field("open", &self.is_open())
            .finish()
    }
}

fn add_parent_dirs(index: &mut HashMap<String, IndexEntry>, name: &str) {
    let mut current = name;
    loop {
        let parent = dirname(current);
        if parent == current || index.contains_key(parent) {
            return;
        }
        index.insert(
            parent.to_string(),
            IndexEntry {
                offset: 0,
                length: 0,
                kind: EntryKind::Directory,
            },
        );
        current = parent;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::writer::ArchiveWriter;

    fn build(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ArchiveWriter::new();
        for (path, data) in files {
            writer.add_bytes(*path, data.to_vec()).unwrap();
        }
        let mut sink = Cursor::new(Vec::new());
        writer.write_to(&mut sink, Some("test-hash")).unwrap();
        sink.into_inner()
    }

    #[test]
    fn reads_registered_files() {
        let volume = Volume::from_bytes(build(&[
            ("/node_modules/a/index.js", b"module.exports = 1"),
            ("/node_modules/a/package.json", b"{}"),
        ]))
        .unwrap();

        assert_eq!(volume.hash(), "test-hash");
        assert_eq!(volume.file_count(), 2);
        assert_eq!(
            volume
                .read_file("/node_modules/a/index.js", Encoding::Utf8)
                .unwrap(),
            "module.exports = 1"
        );
        assert_eq!(volume.read_bytes("/node_modules/a/package.json").unwrap(), b"{}");
    }

    #[test]
    fn ancestors_are_synthesized() {
        let volume = Volume::from_bytes(build(&[("/a/b/c/d.js", b"d")])).unwrap();
        for dir in ["/a/b/c", "/a/b", "/a", "/"] {
            assert_eq!(volume.stat(dir), Some(FileStat::Directory), "{dir}");
        }
        assert_eq!(volume.stat("/a/b/c/d.js"), Some(FileStat::File { size: 1 }));
        assert_eq!(volume.entries().count(), 5);
    }

    #[test]
    fn directories_and_missing_paths_do_not_read() {
        let volume = Volume::from_bytes(build(&[("/a/x", b"x")])).unwrap();
        assert!(volume.read_file("/a", Encoding::Utf8).is_none());
        assert!(volume.read_file("/nope", Encoding::Utf8).is_none());
    }

    #[test]
    fn zero_length_files_are_valid() {
        let volume = Volume::from_bytes(build(&[("/empty", b""), ("/z", b"z")])).unwrap();
        assert_eq!(volume.read_bytes("/empty").unwrap(), b"");
        assert_eq!(volume.stat("/empty"), Some(FileStat::File { size: 0 }));
        assert_eq!(volume.read_bytes("/z").unwrap(), b"z");
    }

    #[test]
    fn zero_entry_archive() {
        let volume = Volume::from_bytes(build(&[])).unwrap();
        assert_eq!(volume.file_count(), 0);
        assert_eq!(volume.entries().count(), 0);
        assert_eq!(volume.hash(), "test-hash");
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let mut bytes = build(&[("/a", b"abcdef")]);
        bytes.truncate(bytes.len() - 2);
        let err = Volume::from_bytes(bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed { .. }));
    }

    #[test]
    fn empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fs");
        std::fs::write(&path, b"").unwrap();
        let err = Volume::open(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed { .. }));
    }

    #[test]
    fn shutdown_makes_volume_unusable() {
        let mut volume = Volume::from_bytes(build(&[("/a", b"a")])).unwrap();
        volume.shutdown();
        assert!(!volume.is_open());
        assert!(!volume.contains("/a"));
        assert!(volume.read_bytes("/a").is_none());
        assert_eq!(volume.hash(), "test-hash");
    }
}
