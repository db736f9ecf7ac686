use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::U48;
use crate::error::{ArchiveError, ArchiveResult};

/// Where an entry's payload bytes come from.
#[derive(Clone, Debug)]
pub enum EntrySource {
    /// Read from disk when the archive is written.
    File(PathBuf),
    /// Held in memory.
    Bytes(Vec<u8>),
}

/// A file queued for packing. Consumed once its payload has been streamed.
#[derive(Clone, Debug)]
pub struct ManifestEntry {
    pub virtual_path: String,
    pub size: U48,
    pub source: EntrySource,
}

impl ManifestEntry {
    pub fn from_file(virtual_path: String, source: PathBuf, size: u64) -> ArchiveResult<Self> {
        if virtual_path.is_empty() {
            return Err(ArchiveError::EmptyName);
        }
        Ok(Self {
            virtual_path,
            size: U48::new("file length", size)?,
            source: EntrySource::File(source),
        })
    }

    pub fn from_bytes(virtual_path: String, data: Vec<u8>) -> ArchiveResult<Self> {
        if virtual_path.is_empty() {
            return Err(ArchiveError::EmptyName);
        }
        Ok(Self {
            virtual_path,
            size: U48::new("file length", data.len() as u64)?,
            source: EntrySource::Bytes(data),
        })
    }

    /// Copy exactly `size` payload bytes into `sink`.
    ///
    /// A disk source whose length no longer matches the scanned size fails
    /// with [`ArchiveError::SizeMismatch`].
    pub(crate) fn stream_into<W: Write>(
        self,
        sink: &mut W,
        origin: &Path,
    ) -> ArchiveResult<u64> {
        let expected = self.size.get();
        match self.source {
            EntrySource::Bytes(data) => {
                sink.write_all(&data).map_err(|e| ArchiveError::io(origin, e))?;
                Ok(expected)
            }
            EntrySource::File(path) => {
                let file = File::open(&path).map_err(|e| ArchiveError::io(&path, e))?;
                let actual = file
                    .metadata()
                    .map_err(|e| ArchiveError::io(&path, e))?
                    .len();
                if actual != expected {
                    return Err(ArchiveError::SizeMismatch {
                        path,
                        expected,
                        actual,
                    });
                }
                let copied = io::copy(&mut file.take(expected), sink)
                    .map_err(|e| ArchiveError::io(&path, e))?;
                if copied != expected {
                    return Err(ArchiveError::SizeMismatch {
                        path,
                        expected,
                        actual: copied,
                    });
                }
                Ok(copied)
            }
        }
    }
}

/// Ordered set of entries keyed by virtual path.
///
/// Iteration order is lexicographic by path and is also the payload order
/// inside the archive. Inserting an existing path replaces the old entry.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(entry.virtual_path.clone(), entry)
    }

    pub fn get(&self, virtual_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(virtual_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    /// Sum of all payload sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size.get()).sum()
    }

    /// Change-detection token over the sorted `(path, size)` pairs.
    ///
    /// Stable across runs and platforms; not an integrity check, since
    /// content edits that keep every size unchanged produce the same value.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"svfs-manifest-v1:");
        for (path, entry) in &self.entries {
            hasher.update(path.as_bytes());
            hasher.update(&[0]);
            hasher.update(&entry.size.to_be_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = ManifestEntry> {
        self.entries.into_values()
    }
}
