use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "svfs",
    about = "Static volume filesystem: pack directory trees into read-only archives",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file (defaults to ./svfs.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pack a directory tree into an archive
    Pack(PackArgs),
    /// List the directories and files stored in archives
    List(ListArgs),
    /// Print a file from the mounted archives
    Cat(CatArgs),
    /// Show the hash recorded in each archive
    Hashes(HashesArgs),
    /// Resolve a module specifier against the mounted archives
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct PackArgs {
    /// Directory to pack
    pub source: Option<PathBuf>,
    /// Virtual prefix the tree is mounted under
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Hash to record instead of the content fingerprint
    #[arg(long)]
    pub hash: Option<String>,
    /// Rewrite even when the existing archive has the same hash
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,
}

#[derive(Args)]
pub struct CatArgs {
    /// Archive to mount; repeat to stack, earliest wins
    #[arg(short, long = "archive", required = true)]
    pub archives: Vec<PathBuf>,
    pub path: String,
}

#[derive(Args)]
pub struct HashesArgs {
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Archive to mount; repeat to stack, earliest wins
    #[arg(short, long = "archive")]
    pub archives: Vec<PathBuf>,
    pub specifier: String,
    /// Base directory to search; repeat for several, in order
    #[arg(short, long = "base")]
    pub bases: Vec<String>,
    /// Fall back to the host filesystem
    #[arg(long)]
    pub fallback: bool,
    #[arg(long)]
    pub preserve_symlinks: bool,
    #[arg(long)]
    pub normalize_paths: bool,
}
