//! CLI definitions for xv.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// xv - X/Twitter stream-archive importer
#[derive(Parser, Debug)]
#[command(name = "xv")]
#[command(author, version)]
#[command(about = "Import X/Twitter stream archives into a compact RocksDB fact store")]
#[command(long_about = r#"
xv - An importer that turns X/Twitter stream archives (zip or tar containers
of bz2-compressed JSON lines) into a compact binary fact store.

Features:
  - Concurrent bounded-memory decode of arbitrarily large archives
  - Compact per-status facts: author, time, reply/quote/retweet, mentions
  - Screen-name history and deletion events as first-class records
  - Idempotent, resumable imports: one transaction per archive entry

Quick start:
  1. Run: xv import /data/archives --store ~/.local/share/xv/store
  2. Interrupt it freely; re-running skips everything already imported
  3. Inspect: xv stats
"#)]
pub struct Cli {
    /// Path to the store directory
    #[arg(long, env = "XV_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Path to a config file (default: ~/.config/xv/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import stream archives into the store
    Import(ImportArgs),

    /// Import full author profiles into the profile side table
    Users(UsersArgs),

    /// Decode archives without a store, printing items or a summary
    Scan(ScanArgs),

    /// Show store row counts and size
    Stats,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Archive files or directories containing .zip/.tar archives
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,

    /// Number of decode workers (0 = one per CPU)
    #[arg(long, short = 'j', default_value = "0")]
    pub jobs: usize,

    /// Completion queue capacity between workers and the import loop
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Overall run deadline in hours
    #[arg(long)]
    pub deadline_hours: Option<u64>,

    /// Skip the final manual compaction
    #[arg(long)]
    pub no_compact: bool,
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Archive files or directories containing .zip/.tar archives
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,

    /// Path to the profile store directory
    #[arg(long, env = "XV_PROFILE_STORE")]
    pub profile_store: Option<PathBuf>,

    /// File of decimal user ids to keep, one per line (default: all users)
    #[arg(long)]
    pub filter: Option<PathBuf>,

    /// Number of decode workers (0 = one per CPU)
    #[arg(long, short = 'j', default_value = "0")]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Archive files or directories containing .zip/.tar archives
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,

    /// Print each decoded item as one JSON line instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Number of decode workers (0 = one per CPU)
    #[arg(long, short = 'j', default_value = "0")]
    pub jobs: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
