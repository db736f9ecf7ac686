use std::fs;

use svfs_types::{FileStat, FsError, FsResult, ReadOnlyFs};

/// The host's real filesystem, viewed through the read-only capability.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFs;

impl ReadOnlyFs for HostFs {
    fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        fs::read(path).map_err(|e| FsError::from_io("readFileSync", path, e))
    }

    fn stat(&self, path: &str) -> FsResult<FileStat> {
        fs::metadata(path)
            .map(|meta| FileStat::from(&meta))
            .map_err(|e| FsError::from_io("statSync", path, e))
    }

    fn realpath(&self, path: &str) -> FsResult<String> {
        let real =
            fs::canonicalize(path).map_err(|e| FsError::from_io("realpathSync", path, e))?;
        Ok(real.to_string_lossy().into_owned())
    }
}
