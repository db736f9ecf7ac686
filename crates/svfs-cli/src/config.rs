use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use svfs_resolve::ResolverConfig;

pub const DEFAULT_CONFIG_FILE: &str = "svfs.toml";

/// Settings for `svfs pack`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub source: Option<PathBuf>,
    pub prefix: String,
    pub output: PathBuf,
    pub hash: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source: None,
            prefix: "/node_modules".into(),
            output: PathBuf::from("dist/static_modules.fs"),
            hash: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvfsConfig {
    pub archive: ArchiveConfig,
    pub resolver: ResolverConfig,
}

impl SvfsConfig {
    /// Load `path`, or `svfs.toml` in the working directory when it exists,
    /// or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
