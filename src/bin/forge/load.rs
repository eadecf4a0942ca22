//! Merge shard files and bulk load them into the catalog store.

use crate::cli::{Cli, LoadArgs};
use anyhow::Context;
use starfield::merge::{EmptyShardPolicy, MergeOptions, ShardMerge};
use starfield::shard::discover_shards;
use starfield::store::{heavy_path, BulkLoader, LoadStats};
use std::time::Instant;

pub fn run(args: &LoadArgs, cli: &Cli) -> anyhow::Result<()> {
    validate_paths(args)?;

    let shards = discover_shards(&args.shards)
        .with_context(|| format!("scanning shard directory {:?}", args.shards))?;
    if shards.is_empty() {
        anyhow::bail!("no *.shard files found in {:?}", args.shards);
    }

    print_plan(args, shards.len(), cli);
    let start = Instant::now();

    let options = MergeOptions {
        shard_stride: args.shard_stride,
        record_stride: args.record_stride,
        empty_shards: if args.skip_empty {
            EmptyShardPolicy::Skip
        } else {
            EmptyShardPolicy::Fail
        },
    };

    let merge = ShardMerge::new(shards, options);
    let mut loader = BulkLoader::create(&args.output)
        .with_context(|| format!("creating store at {:?}", args.output))?;
    let stats = loader.load(merge).context("bulk load failed")?;

    print_stats(&stats, start.elapsed().as_secs_f64());
    Ok(())
}

fn validate_paths(args: &LoadArgs) -> anyhow::Result<()> {
    if !args.shards.is_dir() {
        anyhow::bail!("shard directory not found: {:?}", args.shards);
    }
    if args.shard_stride == 0 || args.record_stride == 0 {
        anyhow::bail!("strides must be at least 1");
    }
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn print_plan(args: &LoadArgs, shard_count: usize, cli: &Cli) {
    println!("Load plan:");
    println!("  Shards:        {} files in {:?}", shard_count, args.shards);
    println!("  Light store:   {:?}", args.output);
    println!("  Heavy store:   {:?}", heavy_path(&args.output));
    if cli.verbose || args.shard_stride > 1 || args.record_stride > 1 {
        println!(
            "  Strides:       shard={} record={}",
            args.shard_stride, args.record_stride
        );
    }
    if args.skip_empty {
        println!("  Empty shards:  skipped");
    }
}

fn print_stats(stats: &LoadStats, elapsed_secs: f64) {
    println!("\nLoad complete:");
    println!("  Records:  {}", stats.records);
    println!("  Batches:  {}", stats.batches);
    println!("  Elapsed:  {:.1}s", elapsed_secs);
    if elapsed_secs > 0.0 {
        println!(
            "  Rate:     {:.0} records/s",
            stats.records as f64 / elapsed_secs
        );
    }
}
