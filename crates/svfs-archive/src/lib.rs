//! Archive container format for svfs.
//!
//! An archive packs a whole directory tree into one read-only file: a
//! compact header indexes every file by virtual path, followed by the raw
//! payload bytes. At runtime archives are mounted into a [`VolumeStack`]
//! that presents them as a single tree.
//!
//! # Architecture
//!
//! - **[`ArchiveWriter`]**: scans folders into a [`Manifest`] and writes the archive
//! - **[`Volume`]**: one opened archive, index parsed eagerly, payload mapped lazily
//! - **[`VolumeStack`]**: mounted volumes with earliest-mount-wins lookups
//!
//! See [`codec`] for the binary layout.

pub mod codec;
pub mod error;
pub mod manifest;
pub mod stack;
pub mod volume;
pub mod writer;

pub use codec::{ArchiveHeader, IndexRecord, INT_SIZE, U48};
pub use error::{ArchiveError, ArchiveResult};
pub use manifest::{EntrySource, Manifest, ManifestEntry};
pub use stack::{Lookup, VolumeStack};
pub use volume::{EntryKind, IndexEntry, Volume};
pub use writer::ArchiveWriter;
