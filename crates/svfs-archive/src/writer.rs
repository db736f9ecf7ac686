use std::fs;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::codec::{header_len, INT_SIZE, U48};
use crate::error::{ArchiveError, ArchiveResult};
use crate::manifest::{Manifest, ManifestEntry};

/// Builds an archive from directory trees and in-memory entries.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    manifest: Manifest,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every file under `source_dir` at `<target_prefix>/<relative path>`.
    ///
    /// Sibling sub-directories are scanned in parallel; all of them finish
    /// before this returns. Any unreadable path aborts the scan and leaves
    /// the manifest untouched. Returns the number of files registered.
    pub fn add_folder(
        &mut self,
        source_dir: impl AsRef<Path>,
        target_prefix: &str,
    ) -> ArchiveResult<usize> {
        let source_dir = source_dir.as_ref();
        let prefix = target_prefix.trim_end_matches('/');
        let entries = scan_dir(source_dir, prefix)?;
        let count = entries.len();
        for entry in entries {
            self.manifest.insert(entry);
        }
        debug!(source = %source_dir.display(), prefix, files = count, "scanned folder");
        Ok(count)
    }

    /// Queue an in-memory file.
    pub fn add_bytes(
        &mut self,
        virtual_path: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> ArchiveResult<()> {
        self.manifest
            .insert(ManifestEntry::from_bytes(virtual_path.into(), data.into())?);
        Ok(())
    }

    /// Queue a single file from disk.
    pub fn add_file(
        &mut self,
        virtual_path: impl Into<String>,
        source: impl AsRef<Path>,
    ) -> ArchiveResult<()> {
        let source = source.as_ref();
        let meta = fs::metadata(source).map_err(|e| ArchiveError::io(source, e))?;
        self.manifest.insert(ManifestEntry::from_file(
            virtual_path.into(),
            source.to_path_buf(),
            meta.len(),
        )?);
        Ok(())
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// The hash [`write`](Self::write) uses when none is supplied.
    pub fn fingerprint(&self) -> String {
        self.manifest.fingerprint()
    }

    /// Write the archive to `output_path` and return the hash stored in it.
    ///
    /// The archive is staged in a temporary file next to the destination and
    /// only renamed into place once the header has been backpatched and the
    /// data synced. On any failure nothing appears at `output_path`.
    pub fn write(
        self,
        output_path: impl AsRef<Path>,
        hash: Option<&str>,
    ) -> ArchiveResult<String> {
        let output = output_path.as_ref();
        let hash = hash
            .map(str::to_owned)
            .unwrap_or_else(|| self.manifest.fingerprint());
        let layout = Layout::plan(&self.manifest, &hash)?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| ArchiveError::io(&parent, e))?;
        let mut staged =
            NamedTempFile::new_in(&parent).map_err(|e| ArchiveError::io(&parent, e))?;

        let files = self.manifest.len();
        {
            let mut sink = BufWriter::new(staged.as_file_mut());
            layout.write(self.manifest, &hash, &mut sink, output)?;
        }
        staged
            .as_file()
            .sync_all()
            .map_err(|e| ArchiveError::io(output, e))?;
        staged
            .persist(output)
            .map_err(|e| ArchiveError::io(output, e.error))?;

        info!(
            path = %output.display(),
            files,
            bytes = layout.total_len,
            hash = %hash,
            "archive written"
        );
        Ok(hash)
    }

    /// Write the archive layout into any seekable sink.
    pub fn write_to<W: Write + Seek>(
        self,
        sink: &mut W,
        hash: Option<&str>,
    ) -> ArchiveResult<String> {
        let hash = hash
            .map(str::to_owned)
            .unwrap_or_else(|| self.manifest.fingerprint());
        let layout = Layout::plan(&self.manifest, &hash)?;
        layout.write(self.manifest, &hash, sink, Path::new("<sink>"))?;
        Ok(hash)
    }
}

/// Field values computed and range-checked before any byte is written.
struct Layout {
    data_offset: U48,
    hash_len: U48,
    records: Vec<(U48, U48, String)>,
    header_len: u64,
    total_len: u64,
}

impl Layout {
    fn plan(manifest: &Manifest, hash: &str) -> ArchiveResult<Self> {
        let hash_len = U48::new("hash length", hash.len() as u64)?;
        let records = manifest
            .iter()
            .map(|entry| {
                Ok((
                    U48::new("name length", entry.virtual_path.len() as u64)?,
                    entry.size,
                    entry.virtual_path.clone(),
                ))
            })
            .collect::<ArchiveResult<Vec<_>>>()?;

        let header_len = header_len(hash.len(), records.iter().map(|(_, _, name)| name.len()));
        let data_offset = U48::new("data offset", header_len)?;
        let total_len = manifest
            .iter()
            .try_fold(header_len, |acc, entry| acc.checked_add(entry.size.get()))
            .ok_or(ArchiveError::ValueOutOfRange {
                field: "archive length",
                value: i128::MAX,
            })?;
        U48::new("archive length", total_len)?;

        Ok(Self {
            data_offset,
            hash_len,
            records,
            header_len,
            total_len,
        })
    }

    /// Header prefix, zeroed index region, payloads, then the index backpatch.
    fn write<W: Write + Seek>(
        &self,
        manifest: Manifest,
        hash: &str,
        sink: &mut W,
        origin: &Path,
    ) -> ArchiveResult<()> {
        let io_err = |e: io::Error| ArchiveError::io(origin, e);

        sink.seek(SeekFrom::Start(0)).map_err(io_err)?;
        sink.write_all(&self.data_offset.to_be_bytes()).map_err(io_err)?;
        sink.write_all(&self.hash_len.to_be_bytes()).map_err(io_err)?;
        sink.write_all(hash.as_bytes()).map_err(io_err)?;

        // Reserve the index region; the trailing terminator stays zero.
        let index_start = (2 * INT_SIZE + hash.len()) as u64;
        io::copy(&mut io::repeat(0).take(self.header_len - index_start), sink).map_err(io_err)?;

        for entry in manifest.into_entries() {
            entry.stream_into(sink, origin)?;
        }

        sink.seek(SeekFrom::Start(index_start)).map_err(io_err)?;
        for (name_len, size, name) in &self.records {
            sink.write_all(&name_len.to_be_bytes()).map_err(io_err)?;
            sink.write_all(&size.to_be_bytes()).map_err(io_err)?;
            sink.write_all(name.as_bytes()).map_err(io_err)?;
        }
        sink.flush().map_err(io_err)
    }
}

fn scan_dir(source: &Path, target: &str) -> ArchiveResult<Vec<ManifestEntry>> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for item in fs::read_dir(source).map_err(|e| ArchiveError::io(source, e))? {
        let item = item.map_err(|e| ArchiveError::io(source, e))?;
        let source_path = item.path();
        let name = item
            .file_name()
            .into_string()
            .map_err(|_| ArchiveError::InvalidName {
                path: source_path.clone(),
            })?;
        let target_path = format!("{target}/{name}");

        let meta = fs::metadata(&source_path).map_err(|e| ArchiveError::io(&source_path, e))?;
        if meta.is_dir() {
            subdirs.push((source_path, target_path));
        } else {
            files.push(ManifestEntry::from_file(target_path, source_path, meta.len())?);
        }
    }

    let nested = subdirs
        .par_iter()
        .map(|(source_path, target_path)| scan_dir(source_path, target_path))
        .collect::<ArchiveResult<Vec<_>>>()?;
    files.extend(nested.into_iter().flatten());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::ArchiveHeader;

    #[test]
    fn layout_places_payload_after_header() {
        let mut writer = ArchiveWriter::new();
        writer.add_bytes("/b.js", "bee").unwrap();
        writer.add_bytes("/a.js", "a").unwrap();

        let mut sink = Cursor::new(Vec::new());
        let hash = writer.write_to(&mut sink, Some("h1")).unwrap();
        assert_eq!(hash, "h1");

        let bytes = sink.into_inner();
        let header = ArchiveHeader::parse(&bytes, Path::new("mem")).unwrap();
        assert_eq!(header.hash, "h1");
        assert_eq!(header.records.len(), 2);
        assert_eq!(header.records[0].name, "/a.js");
        assert_eq!(header.records[1].name, "/b.js");

        let start = header.data_offset as usize;
        assert_eq!(&bytes[start..], b"abee");
    }

    #[test]
    fn default_hash_is_the_manifest_fingerprint() {
        let mut writer = ArchiveWriter::new();
        writer.add_bytes("/x", "1").unwrap();
        let expected = writer.fingerprint();
        let hash = writer.write_to(&mut Cursor::new(Vec::new()), None).unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn add_folder_maps_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg/lib")).unwrap();
        fs::write(dir.path().join("pkg/package.json"), "{}").unwrap();
        fs::write(dir.path().join("pkg/lib/x.js"), "x").unwrap();
        fs::write(dir.path().join("top.js"), "").unwrap();

        let mut writer = ArchiveWriter::new();
        let added = writer.add_folder(dir.path(), "/node_modules/").unwrap();
        assert_eq!(added, 3);

        let paths: Vec<_> = writer
            .manifest()
            .iter()
            .map(|e| e.virtual_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/node_modules/pkg/lib/x.js",
                "/node_modules/pkg/package.json",
                "/node_modules/top.js",
            ]
        );
    }

    #[test]
    fn add_folder_fails_on_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArchiveWriter::new();
        let err = writer
            .add_folder(dir.path().join("absent"), "/m")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
        assert!(writer.is_empty());
    }

    #[test]
    fn failed_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("grows.js");
        fs::write(&src, "short").unwrap();

        let mut writer = ArchiveWriter::new();
        writer.add_file("/grows.js", &src).unwrap();
        fs::write(&src, "much longer now").unwrap();

        let out = dir.path().join("out.fs");
        let err = writer.write(&out, None).unwrap_err();
        assert!(matches!(err, ArchiveError::SizeMismatch { .. }));
        assert!(!out.exists());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "only the source file should remain");
    }

    #[test]
    fn oversized_layout_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let unused = dir.path().join("unused");
        let too_long = U48::MAX.get() + 1;
        assert!(ManifestEntry::from_file("/huge".into(), unused.clone(), too_long).is_err());

        let mut writer = ArchiveWriter::new();
        for name in ["/a", "/b"] {
            let entry =
                ManifestEntry::from_file(name.into(), unused.clone(), U48::MAX.get()).unwrap();
            writer.manifest.insert(entry);
        }
        let out = dir.path().join("big.fs");
        let err = writer.write(&out, None).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ValueOutOfRange { field: "archive length", .. }
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist/static_modules.fs");
        let mut writer = ArchiveWriter::new();
        writer.add_bytes("/a", "a").unwrap();
        writer.write(&out, Some("h")).unwrap();
        assert!(out.is_file());
    }
}
