//! Print header metadata for shard files.

use crate::cli::{Cli, InspectArgs};
use starfield::shard::{discover_shards, ShardFile};

pub fn run(args: &InspectArgs, _cli: &Cli) -> anyhow::Result<()> {
    let shards = if args.path.is_dir() {
        discover_shards(&args.path)?
    } else {
        vec![ShardFile::open(&args.path)?]
    };

    if shards.is_empty() {
        anyhow::bail!("no *.shard files found in {:?}", args.path);
    }

    println!(
        "{:<40} {:>12} {:>20} {:>20}",
        "shard", "records", "key_lo", "key_hi"
    );
    let mut total = 0u64;
    for shard in &shards {
        let header = shard.header();
        println!(
            "{:<40} {:>12} {:>20} {:>20}",
            shard.path().display(),
            header.count,
            header.key_lo,
            header.key_hi
        );
        total += header.count;
    }
    println!("\n{} shards, {} records total", shards.len(), total);
    Ok(())
}
