//! Starserve: binary TCP query server for a loaded catalog store.

use anyhow::Context;
use clap::Parser;
use starfield::server::{self, ServerConfig, DEFAULT_PORT};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "starserve")]
#[command(about = "Serve rectangle queries against a star catalog store")]
#[command(version)]
struct Args {
    /// Light store file; the heavy store is located next to it
    #[arg(long)]
    store: PathBuf,

    /// Listen address
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    listen: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if !args.store.is_file() {
        anyhow::bail!("store not found: {:?}", args.store);
    }

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;

    server::serve(listener, ServerConfig {
        light_path: args.store,
    })
    .await
    .context("server terminated")?;
    Ok(())
}
