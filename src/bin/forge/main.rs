//! Forge: star catalog ingestion CLI
//!
//! Merges sorted shard files into a dense-offset stream and bulk loads
//! the result into the two-file SQLite catalog store.

mod cli;
mod inspect;
mod load;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match &cli.command {
        Commands::Load(args) => load::run(args, &cli),
        Commands::Inspect(args) => inspect::run(args, &cli),
    }
}
