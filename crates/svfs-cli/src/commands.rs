use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use svfs_archive::{ArchiveWriter, EntryKind, Volume, VolumeStack};
use svfs_resolve::{Resolver, ResolverConfig};
use tracing::{info, warn};

use crate::cli::*;
use crate::config::{ArchiveConfig, SvfsConfig};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = SvfsConfig::load(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Pack(args) => cmd_pack(args, &config.archive, format),
        Command::List(args) => cmd_list(args, format),
        Command::Cat(args) => cmd_cat(args),
        Command::Hashes(args) => cmd_hashes(args, format),
        Command::Resolve(args) => cmd_resolve(args, &config, format),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mount_all(archives: &[PathBuf]) -> anyhow::Result<VolumeStack> {
    let mut stack = VolumeStack::new();
    for archive in archives {
        stack
            .mount(archive)
            .with_context(|| format!("mounting {}", archive.display()))?;
    }
    Ok(stack)
}

#[derive(Debug, Serialize)]
struct PackReport {
    output: PathBuf,
    hash: String,
    files: usize,
    skipped: bool,
}

/// Build the archive unless the one at the output path already carries the
/// same hash.
fn pack(args: PackArgs, config: &ArchiveConfig) -> anyhow::Result<PackReport> {
    let source = args
        .source
        .or_else(|| config.source.clone())
        .context("no source directory: pass one or set [archive].source")?;
    let prefix = args.prefix.unwrap_or_else(|| config.prefix.clone());
    let output = args.output.unwrap_or_else(|| config.output.clone());

    let mut writer = ArchiveWriter::new();
    let files = writer
        .add_folder(&source, &prefix)
        .with_context(|| format!("scanning {}", source.display()))?;
    let hash = args
        .hash
        .or_else(|| config.hash.clone())
        .unwrap_or_else(|| writer.fingerprint());

    if !args.force && output.exists() {
        match Volume::open(&output) {
            Ok(existing) if existing.hash() == hash => {
                info!(output = %output.display(), %hash, "archive up to date");
                return Ok(PackReport {
                    output,
                    hash,
                    files,
                    skipped: true,
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    output = %output.display(),
                    error = %err,
                    "existing archive unreadable, rebuilding"
                )
            }
        }
    }

    let hash = writer
        .write(&output, Some(&hash))
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(PackReport {
        output,
        hash,
        files,
        skipped: false,
    })
}

fn cmd_pack(
    args: PackArgs,
    config: &ArchiveConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = pack(args, config)?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if report.skipped {
        println!(
            "{} {} is up to date ({})",
            "✓".green(),
            report.output.display().to_string().bold(),
            report.hash.dimmed()
        );
    } else {
        println!(
            "{} Packed {} files into {}",
            "✓".green().bold(),
            report.files.to_string().bold(),
            report.output.display().to_string().bold()
        );
        println!("  Hash: {}", report.hash.cyan());
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct ListingRow {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

impl ListingRow {
    fn line(&self) -> String {
        match self.size {
            Some(size) => format!("{size:>12}   {}", self.path),
            None => format!("{:>12}   {}", "<dir>", self.path),
        }
    }
}

/// Directories first, then files, each group sorted by path.
fn listing(volume: &Volume) -> Vec<ListingRow> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for path in volume.entries() {
        let Some(entry) = volume.entry(path) else {
            continue;
        };
        match entry.kind {
            EntryKind::Directory => dirs.push(ListingRow {
                path: path.to_string(),
                size: None,
            }),
            EntryKind::File => files.push(ListingRow {
                path: path.to_string(),
                size: Some(entry.length),
            }),
        }
    }
    dirs.sort_by(|a, b| a.path.cmp(&b.path));
    files.sort_by(|a, b| a.path.cmp(&b.path));
    dirs.extend(files);
    dirs
}

fn open_volume(path: &Path) -> anyhow::Result<Volume> {
    Volume::open(path).with_context(|| format!("opening {}", path.display()))
}

fn cmd_list(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut all = Vec::new();
    for archive in &args.archives {
        let volume = open_volume(archive)?;
        let rows = listing(&volume);
        match format {
            OutputFormat::Json => all.push(serde_json::json!({
                "archive": archive,
                "hash": volume.hash(),
                "entries": rows,
            })),
            OutputFormat::Text => {
                if args.archives.len() > 1 {
                    println!("{}:", archive.display().to_string().bold());
                }
                for row in &rows {
                    println!("{}", row.line());
                }
            }
        }
    }
    if format == OutputFormat::Json {
        print_json(&all)?;
    }
    Ok(())
}

fn cmd_cat(args: CatArgs) -> anyhow::Result<()> {
    let stack = mount_all(&args.archives)?;
    let bytes = stack.read_bytes_sync(&args.path)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HashRow<'a> {
    archive: &'a Path,
    hash: String,
}

fn cmd_hashes(args: HashesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut rows = Vec::with_capacity(args.archives.len());
    for archive in &args.archives {
        let volume = open_volume(archive)?;
        rows.push(HashRow {
            archive,
            hash: volume.hash().to_string(),
        });
    }
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text => {
            for row in &rows {
                println!("{}  {}", row.hash.cyan(), row.archive.display());
            }
            Ok(())
        }
    }
}

fn resolver_config(args: &ResolveArgs, config: &ResolverConfig) -> ResolverConfig {
    ResolverConfig {
        fallback: args.fallback || config.fallback,
        normalize_paths: args.normalize_paths || config.normalize_paths,
        preserve_symlinks: args.preserve_symlinks || config.preserve_symlinks,
    }
}

/// Resolve against the mounted archives; without `--base` the archive
/// prefix is the only base.
fn resolve_specifier(
    args: &ResolveArgs,
    config: &SvfsConfig,
) -> anyhow::Result<Option<String>> {
    let stack = mount_all(&args.archives)?;
    let resolver = Resolver::with_config(&stack, resolver_config(args, &config.resolver));
    let bases = if args.bases.is_empty() {
        vec![config.archive.prefix.clone()]
    } else {
        args.bases.clone()
    };
    Ok(resolver.resolve(&args.specifier, &bases)?)
}

fn cmd_resolve(
    args: ResolveArgs,
    config: &SvfsConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let resolved = resolve_specifier(&args, config)?;
    match (format, resolved) {
        (OutputFormat::Json, resolved) => print_json(&serde_json::json!({
            "specifier": args.specifier,
            "resolved": resolved,
        })),
        (OutputFormat::Text, Some(path)) => {
            println!("{path}");
            Ok(())
        }
        (OutputFormat::Text, None) => bail!("Cannot find module '{}'", args.specifier),
    }
}
