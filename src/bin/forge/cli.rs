//! CLI argument definitions for forge

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Star catalog ingestion pipeline")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge shard files and bulk load them into a catalog store
    Load(LoadArgs),

    /// Print header metadata for shard files
    Inspect(InspectArgs),
}

#[derive(Parser)]
pub struct LoadArgs {
    /// Directory containing *.shard input files
    #[arg(long)]
    pub shards: PathBuf,

    /// Output light store file; the heavy store lands next to it
    #[arg(long)]
    pub output: PathBuf,

    /// Process every Nth shard (1 = all)
    #[arg(long, default_value = "1")]
    pub shard_stride: usize,

    /// Within a shard, load every Nth record (1 = all)
    #[arg(long, default_value = "1")]
    pub record_stride: usize,

    /// Skip shards with zero records instead of aborting
    #[arg(long)]
    pub skip_empty: bool,
}

#[derive(Parser)]
pub struct InspectArgs {
    /// Shard file, or a directory to scan for *.shard files
    #[arg(long)]
    pub path: PathBuf,
}
