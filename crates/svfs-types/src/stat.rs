use serde::{Deserialize, Serialize};

/// What a path refers to, as reported by [`ReadOnlyFs::stat`](crate::ReadOnlyFs::stat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FileStat {
    File { size: u64 },
    Directory,
    Symlink,
    Other,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Byte length for files, zero for everything else.
    pub fn size(&self) -> u64 {
        match self {
            Self::File { size } => *size,
            _ => 0,
        }
    }
}

impl From<&std::fs::Metadata> for FileStat {
    fn from(meta: &std::fs::Metadata) -> Self {
        let ty = meta.file_type();
        if ty.is_dir() {
            Self::Directory
        } else if ty.is_file() {
            Self::File { size: meta.len() }
        } else if ty.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }
}
