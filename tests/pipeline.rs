//! End-to-end pipeline: shard files on disk, merge, bulk load, query.

use starfield::error::CatalogError;
use starfield::merge::{MergeOptions, ShardMerge};
use starfield::record::{AttrGroups, CatalogRecord, HeavyAttrs, LightAttrs};
use starfield::shard::{discover_shards, ShardWriter};
use starfield::store::{BulkLoader, CatalogStore, QueryRect};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn star(key: i64, ra: f64, dec: f64, mag: f64) -> CatalogRecord {
    CatalogRecord {
        source_key: key,
        ra,
        dec,
        primary_mag: mag,
        light: LightAttrs {
            parallax: Some(key as f64 * 0.5),
            pmra: Some(-2.0),
            pmdec: None,
            secondary_mag1: Some(mag + 0.5),
            secondary_mag2: None,
        },
        heavy: HeavyAttrs {
            source_id: 4_000_000_000_000_000_000 + key as u64,
            ra_error: Some(0.25 * key as f64),
            ra_dec_corr: Some(0.1),
            ..HeavyAttrs::default()
        },
    }
}

fn write_shard(path: &Path, records: &[CatalogRecord]) {
    let mut writer = ShardWriter::create(path).unwrap();
    for record in records {
        writer.add(record).unwrap();
    }
    writer.finish().unwrap();
}

fn load_dir(shard_dir: &Path, store_dir: &Path) -> PathBuf {
    let shards = discover_shards(shard_dir).unwrap();
    let merge = ShardMerge::new(shards, MergeOptions::default());
    let light_path = store_dir.join("catalog.sqlite3");
    let mut loader = BulkLoader::create(&light_path).unwrap();
    loader.load(merge).unwrap();
    light_path
}

#[test]
fn test_two_shards_full_sky() {
    let dir = TempDir::new().unwrap();
    // Written high-keys-first; discovery order must not matter.
    write_shard(
        &dir.path().join("high.shard"),
        &[
            star(4, 200.0, 10.0, 12.0),
            star(5, 210.0, 20.0, 8.0),
            star(6, 220.0, 30.0, 10.0),
        ],
    );
    write_shard(
        &dir.path().join("low.shard"),
        &[
            star(1, 10.0, -10.0, 11.0),
            star(2, 20.0, -20.0, 7.0),
            star(3, 30.0, -30.0, 9.0),
        ],
    );

    let light_path = load_dir(dir.path(), dir.path());
    let mut store = CatalogStore::open(&light_path).unwrap();
    let rows = store
        .query(&QueryRect::FULL_SKY, 99.0, AttrGroups::NONE)
        .unwrap();

    assert_eq!(rows.len(), 6);
    let mags: Vec<f64> = rows.iter().map(|r| r.primary_mag).collect();
    assert_eq!(mags, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);

    let mut offsets: Vec<u32> = rows.iter().map(|r| r.offset).collect();
    offsets.sort();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);

    // Offsets follow key order: key 2 merged second, so offset 1.
    let brightest = &rows[0];
    assert_eq!(brightest.offset, 1);
    assert_eq!(brightest.ra, 20.0);
}

#[test]
fn test_overlapping_shards_abort_load() {
    let dir = TempDir::new().unwrap();
    write_shard(
        &dir.path().join("a.shard"),
        &[star(1, 10.0, 0.0, 9.0), star(5, 20.0, 0.0, 9.0)],
    );
    write_shard(
        &dir.path().join("b.shard"),
        &[star(4, 30.0, 0.0, 9.0), star(8, 40.0, 0.0, 9.0)],
    );

    let shards = discover_shards(dir.path()).unwrap();
    let merge = ShardMerge::new(shards, MergeOptions::default());
    let mut loader = BulkLoader::create(&dir.path().join("catalog.sqlite3")).unwrap();
    let err = loader.load(merge).unwrap_err();
    assert!(matches!(err, CatalogError::ShardOverlap { .. }));
}

#[test]
fn test_attribute_groups_survive_pipeline() {
    let dir = TempDir::new().unwrap();
    write_shard(&dir.path().join("only.shard"), &[star(7, 100.0, 5.0, 6.5)]);

    let light_path = load_dir(dir.path(), dir.path());
    let mut store = CatalogStore::open(&light_path).unwrap();
    let rows = store
        .query(&QueryRect::FULL_SKY, 99.0, AttrGroups::ALL)
        .unwrap();

    assert_eq!(rows.len(), 1);
    let light = rows[0].light.unwrap();
    assert_eq!(light.parallax, Some(3.5));
    assert_eq!(light.pmdec, None);
    assert_eq!(light.secondary_mag1, Some(7.0));

    let heavy = rows[0].heavy.unwrap();
    assert_eq!(heavy.source_id, 4_000_000_000_000_000_007);
    assert_eq!(heavy.ra_error, Some(1.75));
    assert_eq!(heavy.ra_dec_corr, Some(0.1));
    assert_eq!(heavy.pmra_pmdec_corr, None);
}

#[test]
fn test_record_stride_subsamples_catalog() {
    let dir = TempDir::new().unwrap();
    let records: Vec<CatalogRecord> = (1..=10)
        .map(|k| star(k, k as f64, 0.0, 10.0))
        .collect();
    write_shard(&dir.path().join("only.shard"), &records);

    let shards = discover_shards(dir.path()).unwrap();
    let merge = ShardMerge::new(
        shards,
        MergeOptions {
            record_stride: 2,
            ..MergeOptions::default()
        },
    );
    let light_path = dir.path().join("catalog.sqlite3");
    let mut loader = BulkLoader::create(&light_path).unwrap();
    let stats = loader.load(merge).unwrap();
    assert_eq!(stats.records, 5);

    let mut store = CatalogStore::open(&light_path).unwrap();
    let rows = store
        .query(&QueryRect::FULL_SKY, 99.0, AttrGroups::NONE)
        .unwrap();
    let mut offsets: Vec<u32> = rows.iter().map(|r| r.offset).collect();
    offsets.sort();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
}
