use serde::{Deserialize, Serialize};

/// Resolver behaviour switches.
///
/// ```toml
/// [resolver]
/// fallback = true
/// normalize_paths = false
/// preserve_symlinks = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Consult the host filesystem when the primary capability misses.
    pub fallback: bool,
    /// Rewrite Windows-style paths before every primary probe.
    pub normalize_paths: bool,
    /// Return found paths as probed instead of canonicalizing them.
    pub preserve_symlinks: bool,
}
