//! Module resolution over read-only filesystems.
//!
//! A [`Resolver`] answers "which file does `require(specifier)` from these
//! base directories mean?" using only the [`ReadOnlyFs`](svfs_types::ReadOnlyFs)
//! capability, so it works the same over a mounted `svfs_archive::VolumeStack`,
//! an in-memory tree or the host disk ([`HostFs`]).
//!
//! Resolution order for each base: exact file, package `main`, registered
//! extensions, then `index` plus extensions. Results, file classifications
//! and package mains are memoized for the resolver's lifetime.

pub mod cache;
pub mod config;
pub mod error;
pub mod extensions;
pub mod host;
pub mod package;
pub mod resolver;

pub use cache::{Classification, ProbeCache, ResolverCache};
pub use config::ResolverConfig;
pub use error::{ResolveError, ResolveResult};
pub use extensions::{
    strip_bom, ExtensionHandler, Extensions, LoadedModule, ProgramText, StructuredData,
};
pub use host::HostFs;
pub use package::{PackageDescriptor, DESCRIPTOR_FILE};
pub use resolver::Resolver;
