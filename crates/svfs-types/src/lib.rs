//! Foundation types for svfs, the static volume filesystem.
//!
//! Every other svfs crate depends on `svfs-types`. It defines the narrow
//! read-only filesystem capability that both the archive volumes and the
//! module resolver speak, so the resolver never needs to know where a file
//! physically lives.
//!
//! # Key Types
//!
//! - [`ReadOnlyFs`] - `read_file` / `stat` / `realpath` capability
//! - [`FileStat`] - tagged stat variant consumed by pattern matching
//! - [`FsError`] / [`ErrorCode`] - POSIX-coded, path-tagged failures
//! - [`MemoryFs`] - in-memory capability for tests and embedding
//! - [`Unixified`] - adapter rewriting Windows-style paths before each probe

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod stat;

pub use error::{ErrorCode, FsError, FsResult};
pub use fs::{Encoding, ReadOnlyFs, Unixified};
pub use memory::MemoryFs;
pub use stat::FileStat;
