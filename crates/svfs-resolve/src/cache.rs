use std::cell::RefCell;
use std::collections::HashMap;

use svfs_types::{ErrorCode, FileStat};

/// What a probe found at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    File,
    Directory,
    Missing(ErrorCode),
}

/// Anything that stats successfully and is not a directory counts as a file.
impl From<&FileStat> for Classification {
    fn from(stat: &FileStat) -> Self {
        match stat {
            FileStat::Directory => Self::Directory,
            _ => Self::File,
        }
    }
}

/// Per-filesystem memo of classifications and package-main values.
#[derive(Debug, Default)]
pub struct ProbeCache {
    stats: RefCell<HashMap<String, Classification>>,
    package_mains: RefCell<HashMap<String, Option<String>>>,
}

impl ProbeCache {
    pub fn classification(&self, path: &str) -> Option<Classification> {
        self.stats.borrow().get(path).copied()
    }

    pub(crate) fn insert_classification(&self, path: &str, value: Classification) {
        self.stats.borrow_mut().insert(path.to_string(), value);
    }

    /// `Some(None)` records a directory without a usable main.
    pub fn package_main(&self, dir: &str) -> Option<Option<String>> {
        self.package_mains.borrow().get(dir).cloned()
    }

    pub(crate) fn insert_package_main(&self, dir: &str, main: Option<String>) {
        self.package_mains.borrow_mut().insert(dir.to_string(), main);
    }

    pub fn classified_paths(&self) -> usize {
        self.stats.borrow().len()
    }
}

/// All memoized state owned by one resolver.
///
/// Entries are never invalidated: the filesystems behind a resolver are
/// treated as immutable for its lifetime. Interior mutability keeps the
/// resolver `!Sync`; hosts that share one across threads must serialize
/// access themselves.
#[derive(Debug, Default)]
pub struct ResolverCache {
    resolutions: RefCell<HashMap<String, Option<String>>>,
    pub(crate) primary: ProbeCache,
    pub(crate) fallback: ProbeCache,
}

impl ResolverCache {
    pub fn key(specifier: &str, bases: &[&str]) -> String {
        let mut key = String::from(specifier);
        for base in bases {
            key.push('\0');
            key.push_str(base);
        }
        key
    }

    pub fn resolution(&self, key: &str) -> Option<Option<String>> {
        self.resolutions.borrow().get(key).cloned()
    }

    pub(crate) fn insert_resolution(&self, key: String, value: Option<String>) {
        self.resolutions.borrow_mut().insert(key, value);
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.borrow().len()
    }

    pub fn primary(&self) -> &ProbeCache {
        &self.primary
    }

    pub fn fallback(&self) -> &ProbeCache {
        &self.fallback
    }
}
