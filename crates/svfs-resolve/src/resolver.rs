use svfs_types::path::{
    self, has_trailing_separator, is_absolute, is_windows_path, unixify_path,
};
use svfs_types::{Encoding, ReadOnlyFs, Unixified};
use tracing::{debug, trace};

use crate::cache::{Classification, ProbeCache, ResolverCache};
use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::extensions::{Extensions, LoadedModule};
use crate::host::HostFs;
use crate::package::{PackageDescriptor, DESCRIPTOR_FILE};

const INDEX: &str = "index";

/// Maps module specifiers to concrete file paths.
///
/// The primary capability is always consulted first. The fallback, when
/// present, is only searched after every base missed on the primary. All
/// probes are memoized, so resolving the same `(specifier, bases)` twice
/// performs no filesystem access the second time.
pub struct Resolver<'f> {
    primary: Box<dyn ReadOnlyFs + 'f>,
    fallback: Option<Box<dyn ReadOnlyFs + 'f>>,
    extensions: Extensions,
    config: ResolverConfig,
    cache: ResolverCache,
}

impl<'f> Resolver<'f> {
    pub fn new(primary: impl ReadOnlyFs + 'f) -> Self {
        Self::with_config(primary, ResolverConfig::default())
    }

    /// Build a resolver. `config.fallback` selects the host filesystem as
    /// fallback; use [`Resolver::with_fallback`] to supply another.
    pub fn with_config(primary: impl ReadOnlyFs + 'f, config: ResolverConfig) -> Self {
        let primary: Box<dyn ReadOnlyFs + 'f> = if config.normalize_paths {
            Box::new(Unixified(primary))
        } else {
            Box::new(primary)
        };
        let fallback = config
            .fallback
            .then(|| Box::new(HostFs) as Box<dyn ReadOnlyFs + 'f>);
        Self {
            primary,
            fallback,
            extensions: Extensions::default(),
            config,
            cache: ResolverCache::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl ReadOnlyFs + 'f) -> Self {
        self.fallback = Some(Box::new(fallback));
        self.config.fallback = true;
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Resolve `specifier` against `bases`, in order.
    ///
    /// Returns `Ok(None)` when nothing matches; errors are reserved for
    /// fatal filesystem failures and malformed package descriptors. An
    /// absolute specifier ignores `bases`. A relative one with no bases, or
    /// an empty specifier, resolves to nothing.
    pub fn resolve<S: AsRef<str>>(
        &self,
        specifier: &str,
        bases: &[S],
    ) -> ResolveResult<Option<String>> {
        if specifier.is_empty() {
            return Ok(None);
        }
        let bases: Vec<&str> = if is_absolute(specifier) {
            vec![""]
        } else {
            bases.iter().map(AsRef::as_ref).collect()
        };
        if bases.is_empty() {
            return Ok(None);
        }

        let key = ResolverCache::key(specifier, &bases);
        if let Some(hit) = self.cache.resolution(&key) {
            trace!(specifier, "resolution cache hit");
            return Ok(hit);
        }

        let mut found = self.primary_probe().search(specifier, &bases)?;
        if found.is_none() {
            if let Some(probe) = self.fallback_probe() {
                debug!(specifier, "not found in primary filesystem, trying fallback");
                found = probe.search(specifier, &bases)?;
            }
        }

        match &found {
            Some(path) => debug!(specifier, resolved = %path, "resolved"),
            None => debug!(specifier, ?bases, "unresolved"),
        }
        self.cache.insert_resolution(key, found.clone());
        Ok(found)
    }

    /// Like [`Resolver::resolve`], but a miss becomes
    /// [`ResolveError::ModuleNotFound`].
    pub fn require_path<S: AsRef<str>>(
        &self,
        specifier: &str,
        bases: &[S],
    ) -> ResolveResult<String> {
        self.resolve(specifier, bases)?
            .ok_or_else(|| ResolveError::ModuleNotFound {
                specifier: specifier.to_string(),
            })
    }

    /// Read a resolved file and hand it to the handler registered for its
    /// extension. The primary filesystem wins whenever it has the file.
    pub fn load(&self, filename: &str) -> ResolveResult<LoadedModule> {
        let handler = self
            .extensions
            .handler_for(filename)
            .ok_or_else(|| ResolveError::NoHandler {
                filename: filename.to_string(),
            })?;
        let not_found = || ResolveError::ModuleNotFound {
            specifier: filename.to_string(),
        };

        let text = if self.primary_probe().classify(filename)? == Classification::File {
            self.primary.read_file(filename, Encoding::Utf8)?
        } else {
            let fallback = self.fallback.as_ref().ok_or_else(not_found)?;
            match fallback.read_file(filename, Encoding::Utf8) {
                Ok(text) => text,
                Err(err) if err.is_recoverable() => return Err(not_found()),
                Err(err) => return Err(err.into()),
            }
        };
        handler.compile(filename, &text)
    }

    /// Resolve, then load.
    pub fn require<S: AsRef<str>>(
        &self,
        specifier: &str,
        bases: &[S],
    ) -> ResolveResult<LoadedModule> {
        let filename = self.require_path(specifier, bases)?;
        self.load(&filename)
    }

    fn primary_probe(&self) -> Probe<'_> {
        Probe {
            fs: &*self.primary,
            cache: &self.cache.primary,
            extensions: &self.extensions,
            preserve_symlinks: self.config.preserve_symlinks,
        }
    }

    fn fallback_probe(&self) -> Option<Probe<'_>> {
        self.fallback.as_deref().map(|fs| Probe {
            fs,
            cache: &self.cache.fallback,
            extensions: &self.extensions,
            preserve_symlinks: self.config.preserve_symlinks,
        })
    }
}

/// The search algorithm bound to one filesystem and its memo.
struct Probe<'a> {
    fs: &'a dyn ReadOnlyFs,
    cache: &'a ProbeCache,
    extensions: &'a Extensions,
    preserve_symlinks: bool,
}

impl Probe<'_> {
    fn search(&self, specifier: &str, bases: &[&str]) -> ResolveResult<Option<String>> {
        let trailing = has_trailing_separator(specifier);

        for base in bases {
            if !base.is_empty() && self.classify(base)? != Classification::Directory {
                continue;
            }

            let mut candidate = path::resolve(base, specifier);
            let mut kind = self.classify(&candidate)?;
            if kind != Classification::File
                && kind != Classification::Directory
                && is_windows_path(&candidate)
            {
                let unixified = unixify_path(&candidate);
                let retried = self.classify(&unixified)?;
                if retried != kind {
                    candidate = unixified;
                    kind = retried;
                }
            }

            let mut found = None;
            if !trailing {
                found = match kind {
                    Classification::File => Some(self.canonical(&candidate)?),
                    Classification::Directory => self.try_package(&candidate)?,
                    Classification::Missing(_) => None,
                };
                if found.is_none() {
                    found = self.try_extensions(&candidate)?;
                }
            }

            if found.is_none() && kind == Classification::Directory {
                if trailing {
                    found = self.try_package(&candidate)?;
                }
                if found.is_none() {
                    found = self.try_extensions(&path::resolve(&candidate, INDEX))?;
                }
            }

            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn classify(&self, path: &str) -> ResolveResult<Classification> {
        if let Some(hit) = self.cache.classification(path) {
            return Ok(hit);
        }
        let kind = match self.fs.stat(path) {
            Ok(stat) => Classification::from(&stat),
            Err(err) if err.is_recoverable() => Classification::Missing(err.code()),
            Err(err) => return Err(err.into()),
        };
        self.cache.insert_classification(path, kind);
        Ok(kind)
    }

    fn canonical(&self, path: &str) -> ResolveResult<String> {
        if self.preserve_symlinks {
            Ok(path.to_string())
        } else {
            Ok(self.fs.realpath(path)?)
        }
    }

    fn try_file(&self, path: &str) -> ResolveResult<Option<String>> {
        match self.classify(path)? {
            Classification::File => self.canonical(path).map(Some),
            _ => Ok(None),
        }
    }

    fn try_extensions(&self, path: &str) -> ResolveResult<Option<String>> {
        for ext in self.extensions.names() {
            if let Some(found) = self.try_file(&format!("{path}{ext}"))? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn try_package(&self, dir: &str) -> ResolveResult<Option<String>> {
        let Some(main) = self.package_main(dir)? else {
            return Ok(None);
        };
        let filename = path::resolve(dir, &main);
        if let Some(found) = self.try_file(&filename)? {
            return Ok(Some(found));
        }
        if let Some(found) = self.try_extensions(&filename)? {
            return Ok(Some(found));
        }
        self.try_extensions(&path::resolve(&filename, INDEX))
    }

    fn package_main(&self, dir: &str) -> ResolveResult<Option<String>> {
        if let Some(hit) = self.cache.package_main(dir) {
            return Ok(hit);
        }
        let descriptor = path::resolve(dir, DESCRIPTOR_FILE);
        let main = match self.fs.read_file(&descriptor, Encoding::Utf8) {
            Ok(text) => PackageDescriptor::parse(&text, &descriptor)?.into_main(),
            Err(err) if err.is_recoverable() => None,
            Err(err) => return Err(err.into()),
        };
        trace!(dir, main = ?main, "package main");
        self.cache.insert_package_main(dir, main.clone());
        Ok(main)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use svfs_types::{ErrorCode, FileStat, FsResult, MemoryFs};

    use super::*;
    use crate::extensions::StructuredData;

    /// Counts every probe that reaches the wrapped filesystem.
    struct Counting<F> {
        inner: F,
        probes: Cell<usize>,
    }

    impl<F> Counting<F> {
        fn new(inner: F) -> Self {
            Self {
                inner,
                probes: Cell::new(0),
            }
        }

        fn take(&self) -> usize {
            self.probes.replace(0)
        }
    }

    impl<F: ReadOnlyFs> ReadOnlyFs for Counting<F> {
        fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
            self.probes.set(self.probes.get() + 1);
            self.inner.read_bytes(path)
        }

        fn stat(&self, path: &str) -> FsResult<FileStat> {
            self.probes.set(self.probes.get() + 1);
            self.inner.stat(path)
        }

        fn realpath(&self, path: &str) -> FsResult<String> {
            self.probes.set(self.probes.get() + 1);
            self.inner.realpath(path)
        }
    }

    /// Canonical paths live under `/real`.
    struct Aliased(MemoryFs);

    impl ReadOnlyFs for Aliased {
        fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
            self.0.read_bytes(path)
        }

        fn stat(&self, path: &str) -> FsResult<FileStat> {
            self.0.stat(path)
        }

        fn realpath(&self, path: &str) -> FsResult<String> {
            Ok(format!("/real{}", self.0.realpath(path)?))
        }
    }

    const NO_BASES: &[&str] = &[];

    fn modules() -> MemoryFs {
        MemoryFs::new()
            .with_file("/pkg/package.json", r#"{"main":"lib/x"}"#)
            .with_file("/pkg/lib/x.js", "module.exports = 1;")
            .with_file("/m.js", "js")
            .with_file("/m.json", "{}")
            .with_file("/node_modules/semver/package.json", r#"{"main":"semver.js"}"#)
            .with_file("/node_modules/semver/semver.js", "semver")
            .with_file("/app/src/util.js", "util")
            .with_file("/app/src/lib/index.js", "index")
            .with_file("/app/src/lib.js", "lib file")
    }

    #[test]
    fn package_main_with_extension_probe() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("/pkg", NO_BASES).unwrap().as_deref(),
            Some("/pkg/lib/x.js")
        );
    }

    #[test]
    fn extension_order_is_registry_order() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("/m", NO_BASES).unwrap().as_deref(),
            Some("/m.js")
        );

        let mut reversed = Extensions::empty();
        reversed.register(".json", StructuredData);
        reversed.register(".js", crate::extensions::ProgramText);
        let resolver = Resolver::new(modules()).with_extensions(reversed);
        assert_eq!(
            resolver.resolve("/m", NO_BASES).unwrap().as_deref(),
            Some("/m.json")
        );
    }

    #[test]
    fn exact_file_wins_over_extensions() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("./util.js", &["/app/src"]).unwrap().as_deref(),
            Some("/app/src/util.js")
        );
        assert_eq!(
            resolver.resolve("./util", &["/app/src"]).unwrap().as_deref(),
            Some("/app/src/util.js")
        );
    }

    #[test]
    fn bases_are_searched_in_order() {
        let resolver = Resolver::new(modules());
        let bases = ["/app/node_modules", "/app/src/util.js", "/node_modules"];
        assert_eq!(
            resolver.resolve("semver", &bases).unwrap().as_deref(),
            Some("/node_modules/semver/semver.js")
        );
    }

    #[test]
    fn file_beside_directory_wins_without_trailing_slash() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("./lib", &["/app/src"]).unwrap().as_deref(),
            Some("/app/src/lib.js")
        );
    }

    #[test]
    fn trailing_slash_only_matches_directories() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("./lib/", &["/app/src"]).unwrap().as_deref(),
            Some("/app/src/lib/index.js")
        );
        assert_eq!(resolver.resolve("./util/", &["/app/src"]).unwrap(), None);
    }

    #[test]
    fn directory_without_descriptor_uses_index() {
        let fs = MemoryFs::new().with_file("/dir/index.json", r#"{"a":1}"#);
        let resolver = Resolver::new(fs);
        assert_eq!(
            resolver.resolve("/dir", NO_BASES).unwrap().as_deref(),
            Some("/dir/index.json")
        );
    }

    #[test]
    fn unresolvable_main_falls_through_to_index() {
        let fs = MemoryFs::new()
            .with_file("/dir/package.json", r#"{"main":"missing.js"}"#)
            .with_file("/dir/index.js", "");
        let resolver = Resolver::new(fs);
        assert_eq!(
            resolver.resolve("/dir", NO_BASES).unwrap().as_deref(),
            Some("/dir/index.js")
        );
    }

    #[test]
    fn main_pointing_at_directory_uses_its_index() {
        let fs = MemoryFs::new()
            .with_file("/dir/package.json", r#"{"main":"./dist"}"#)
            .with_file("/dir/dist/index.js", "");
        let resolver = Resolver::new(fs);
        assert_eq!(
            resolver.resolve("/dir", NO_BASES).unwrap().as_deref(),
            Some("/dir/dist/index.js")
        );
    }

    #[test]
    fn not_found_is_none_and_translates() {
        let resolver = Resolver::new(modules());
        assert_eq!(resolver.resolve("nope", &["/node_modules"]).unwrap(), None);
        assert_eq!(resolver.resolve("", &["/node_modules"]).unwrap(), None);
        assert_eq!(resolver.resolve("./x", NO_BASES).unwrap(), None);

        let err = resolver.require_path("nope", &["/node_modules"]).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::ModuleNotFound { ref specifier } if specifier == "nope"
        ));
        assert_eq!(err.to_string(), "Cannot find module 'nope'");
    }

    #[test]
    fn second_resolution_performs_no_probes() {
        let fs = Counting::new(modules());
        let resolver = Resolver::new(&fs);

        let first = resolver.resolve("semver", &["/app", "/node_modules"]).unwrap();
        assert!(fs.take() > 0);
        let second = resolver.resolve("semver", &["/app", "/node_modules"]).unwrap();
        assert_eq!(fs.take(), 0);
        assert_eq!(first, second);

        assert_eq!(resolver.resolve("missing", &["/node_modules"]).unwrap(), None);
        fs.take();
        assert_eq!(resolver.resolve("missing", &["/node_modules"]).unwrap(), None);
        assert_eq!(fs.take(), 0);
        assert_eq!(resolver.cache().resolutions(), 2);
    }

    #[test]
    fn shared_classifications_are_reused_across_specifiers() {
        let fs = Counting::new(modules());
        let resolver = Resolver::new(&fs);
        resolver.resolve("/pkg", NO_BASES).unwrap();
        let cold = fs.take();
        resolver.resolve("/pkg/", NO_BASES).unwrap();
        assert!(fs.take() < cold);
        assert_eq!(
            resolver.cache().primary().package_main("/pkg"),
            Some(Some("lib/x".to_string()))
        );
        assert_eq!(
            resolver.cache().primary().classification("/nope.js"),
            None
        );
        assert_eq!(
            resolver.cache().primary().classification("/pkg/lib/x"),
            Some(Classification::Missing(ErrorCode::NotFound))
        );
    }

    #[test]
    fn malformed_descriptor_is_fatal_and_not_cached() {
        let fs = MemoryFs::new()
            .with_file("/bad/package.json", "{ not json")
            .with_file("/bad/index.js", "");
        let resolver = Resolver::new(fs);
        for _ in 0..2 {
            let err = resolver.resolve("/bad", NO_BASES).unwrap_err();
            assert!(matches!(err, ResolveError::MalformedDescriptor { .. }));
            assert_eq!(err.path(), Some("/bad/package.json"));
        }
        assert_eq!(resolver.cache().resolutions(), 0);
        assert_eq!(resolver.cache().primary().package_main("/bad"), None);
    }

    #[test]
    fn windows_candidate_retries_unixified() {
        let resolver = Resolver::new(modules());
        assert_eq!(
            resolver.resolve("C:\\pkg\\lib\\x.js", NO_BASES).unwrap().as_deref(),
            Some("/pkg/lib/x.js")
        );
    }

    #[test]
    fn normalize_paths_unixifies_every_probe() {
        let config = ResolverConfig {
            normalize_paths: true,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_config(modules(), config);
        assert_eq!(
            resolver.resolve("./util", &["C:\\app\\src"]).unwrap().as_deref(),
            Some("/app/src/util.js")
        );

        let plain = Resolver::new(modules());
        assert_eq!(plain.resolve("./util", &["C:\\app\\src"]).unwrap(), None);
    }

    #[test]
    fn realpath_unless_preserving_symlinks() {
        let resolver = Resolver::new(Aliased(modules()));
        assert_eq!(
            resolver.resolve("/m", NO_BASES).unwrap().as_deref(),
            Some("/real/m.js")
        );

        let config = ResolverConfig {
            preserve_symlinks: true,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_config(Aliased(modules()), config);
        assert_eq!(
            resolver.resolve("/m", NO_BASES).unwrap().as_deref(),
            Some("/m.js")
        );
    }

    #[test]
    fn fallback_only_after_every_base_misses() {
        let host =
            Counting::new(MemoryFs::new().with_file("/node_modules/host-only/index.js", ""));
        let resolver = Resolver::new(modules()).with_fallback(&host);
        assert!(resolver.has_fallback());

        let found = resolver.resolve("semver", &["/node_modules"]).unwrap();
        assert_eq!(found.as_deref(), Some("/node_modules/semver/semver.js"));
        assert_eq!(host.take(), 0);

        let found = resolver.resolve("host-only", &["/node_modules"]).unwrap();
        assert_eq!(found.as_deref(), Some("/node_modules/host-only/index.js"));
        assert!(host.take() > 0);
        assert!(resolver.cache().fallback().classified_paths() > 0);
    }

    #[test]
    fn fatal_stat_error_propagates() {
        struct Broken;
        impl ReadOnlyFs for Broken {
            fn read_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
                Err(svfs_types::FsError::not_found("readFileSync", path))
            }
            fn stat(&self, path: &str) -> FsResult<FileStat> {
                Err(svfs_types::FsError::from_io(
                    "statSync",
                    path,
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ))
            }
            fn realpath(&self, path: &str) -> FsResult<String> {
                Ok(path.to_string())
            }
        }

        let resolver = Resolver::new(Broken);
        let err = resolver.resolve("/x", NO_BASES).unwrap_err();
        assert!(matches!(err, ResolveError::Fs(ref e) if e.code() == ErrorCode::Unknown));
        assert_eq!(resolver.cache().resolutions(), 0);
    }

    #[test]
    fn load_uses_handler_for_extension() {
        let fs = MemoryFs::new()
            .with_file("/a.js", "\u{feff}run();")
            .with_file("/d.json", "{\"k\":true}")
            .with_file("/bad.json", "{");
        let resolver = Resolver::new(fs);

        assert_eq!(
            resolver.load("/a.js").unwrap(),
            LoadedModule::Program {
                filename: "/a.js".into(),
                source: "run();".into()
            }
        );
        match resolver.require("/d", NO_BASES).unwrap() {
            LoadedModule::Data { filename, value } => {
                assert_eq!(filename, "/d.json");
                assert_eq!(value["k"], true);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            resolver.load("/bad.json").unwrap_err(),
            ResolveError::MalformedDocument { .. }
        ));
        assert!(matches!(
            resolver.load("/missing.js").unwrap_err(),
            ResolveError::ModuleNotFound { .. }
        ));
    }

    #[test]
    fn load_prefers_primary_over_fallback() {
        let host = MemoryFs::new()
            .with_file("/a.js", "host")
            .with_file("/b.js", "host b");
        let resolver =
            Resolver::new(MemoryFs::new().with_file("/a.js", "primary")).with_fallback(host);

        let source = |name: &str| match resolver.load(name).unwrap() {
            LoadedModule::Program { source, .. } => source,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(source("/a.js"), "primary");
        assert_eq!(source("/b.js"), "host b");
        assert!(matches!(
            resolver.load("/c.js").unwrap_err(),
            ResolveError::ModuleNotFound { .. }
        ));
    }
}
