//! Transactional bulk loading of the merged record stream.
//!
//! The loader drains a [`ShardMerge`](crate::merge::ShardMerge) (or any
//! iterator of merged records) and emits three co-located writes per
//! record: one rectangle-index row, one light row, one heavy row, all
//! keyed by the merge offset. Writes are grouped into fixed-size batches,
//! one transaction per target connection per batch; a batch boundary never
//! splits a single record's three writes.
//!
//! Setup is destructive: existing tables in a reused store are dropped.
//! A transaction failure mid-load is fatal to the whole run — the loader
//! targets a trusted, single-pass, restart-from-scratch ingestion model.

use crate::error::Result;
use crate::merge::MergedRecord;
use crate::store::heavy_path;
use rusqlite::{params, Connection};
use std::path::Path;

/// Records per transaction batch.
pub const BATCH_SIZE: usize = 16_384;
/// Offsets between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 1 << 24;

const LIGHT_SCHEMA: &str = "\
DROP TABLE IF EXISTS star_rtree;
DROP TABLE IF EXISTS star_light;
CREATE VIRTUAL TABLE star_rtree USING rtree(
    idoffset, ralo, rahi, declo, dechi, lomag, himag
);
CREATE TABLE star_light (
    idoffset        INTEGER PRIMARY KEY,
    ra              REAL NOT NULL,
    dec             REAL NOT NULL,
    parallax        REAL DEFAULT NULL,
    pmra            REAL DEFAULT NULL,
    pmdec           REAL DEFAULT NULL,
    primary_mag     REAL NOT NULL,
    secondary_mag1  REAL DEFAULT NULL,
    secondary_mag2  REAL DEFAULT NULL
);
";

const HEAVY_SCHEMA: &str = "\
DROP TABLE IF EXISTS star_heavy;
CREATE TABLE star_heavy (
    idoffset             INTEGER PRIMARY KEY,
    source_id            INTEGER NOT NULL,
    ra_error             REAL DEFAULT NULL,
    dec_error            REAL DEFAULT NULL,
    parallax_error       REAL DEFAULT NULL,
    pmra_error           REAL DEFAULT NULL,
    pmdec_error          REAL DEFAULT NULL,
    ra_dec_corr          REAL DEFAULT NULL,
    ra_parallax_corr     REAL DEFAULT NULL,
    ra_pmra_corr         REAL DEFAULT NULL,
    ra_pmdec_corr        REAL DEFAULT NULL,
    dec_parallax_corr    REAL DEFAULT NULL,
    dec_pmra_corr        REAL DEFAULT NULL,
    dec_pmdec_corr       REAL DEFAULT NULL,
    parallax_pmra_corr   REAL DEFAULT NULL,
    parallax_pmdec_corr  REAL DEFAULT NULL,
    pmra_pmdec_corr      REAL DEFAULT NULL
);
";

const INSERT_RTREE: &str =
    "INSERT INTO star_rtree VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const INSERT_LIGHT: &str =
    "INSERT INTO star_light VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const INSERT_HEAVY: &str = "INSERT INTO star_heavy VALUES \
    (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

/// Counters reported after a completed load.
#[derive(Debug, Clone, Copy)]
pub struct LoadStats {
    pub records: u64,
    pub batches: u64,
}

/// Exclusive single-threaded writer for the two-file catalog store.
pub struct BulkLoader {
    light: Connection,
    heavy: Connection,
}

impl BulkLoader {
    /// Open (or create) both store files, apply bulk-load pragmas, and
    /// recreate the three tables. Prior contents are discarded by design.
    pub fn create(light_path: &Path) -> Result<Self> {
        let light = Connection::open(light_path)?;
        let heavy = Connection::open(heavy_path(light_path))?;

        for conn in [&light, &heavy] {
            conn.pragma_update(None, "synchronous", "OFF")?;
            conn.pragma_update(None, "journal_mode", "MEMORY")?;
        }
        light.execute_batch(LIGHT_SCHEMA)?;
        heavy.execute_batch(HEAVY_SCHEMA)?;

        Ok(BulkLoader { light, heavy })
    }

    /// Drain `stream` into the store. The first error — from the merge or
    /// from a transaction — aborts the load; nothing is rolled forward.
    pub fn load<I>(&mut self, stream: I) -> Result<LoadStats>
    where
        I: IntoIterator<Item = Result<MergedRecord>>,
    {
        let mut batch: Vec<MergedRecord> = Vec::with_capacity(BATCH_SIZE);
        let mut stats = LoadStats {
            records: 0,
            batches: 0,
        };

        for item in stream {
            let merged = item?;
            if merged.offset % PROGRESS_INTERVAL == 0 && merged.offset > 0 {
                tracing::info!(offset = merged.offset, "load progress");
            }
            batch.push(merged);
            if batch.len() == BATCH_SIZE {
                self.flush_batch(&batch)?;
                stats.records += batch.len() as u64;
                stats.batches += 1;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.flush_batch(&batch)?;
            stats.records += batch.len() as u64;
            stats.batches += 1;
        }

        Ok(stats)
    }

    /// Write one batch under one transaction per connection.
    fn flush_batch(&mut self, batch: &[MergedRecord]) -> Result<()> {
        let light_tx = self.light.transaction()?;
        let heavy_tx = self.heavy.transaction()?;

        {
            let mut insert_rtree = light_tx.prepare_cached(INSERT_RTREE)?;
            let mut insert_light = light_tx.prepare_cached(INSERT_LIGHT)?;
            let mut insert_heavy = heavy_tx.prepare_cached(INSERT_HEAVY)?;

            for merged in batch {
                let offset = merged.offset as i64;
                let r = &merged.record;
                let (lomag, himag) = r.mag_range();

                insert_rtree
                    .execute(params![offset, r.ra, r.ra, r.dec, r.dec, lomag, himag])?;
                insert_light.execute(params![
                    offset,
                    r.ra,
                    r.dec,
                    r.light.parallax,
                    r.light.pmra,
                    r.light.pmdec,
                    r.primary_mag,
                    r.light.secondary_mag1,
                    r.light.secondary_mag2,
                ])?;
                insert_heavy.execute(params![
                    offset,
                    r.heavy.source_id as i64,
                    r.heavy.ra_error,
                    r.heavy.dec_error,
                    r.heavy.parallax_error,
                    r.heavy.pmra_error,
                    r.heavy.pmdec_error,
                    r.heavy.ra_dec_corr,
                    r.heavy.ra_parallax_corr,
                    r.heavy.ra_pmra_corr,
                    r.heavy.ra_pmdec_corr,
                    r.heavy.dec_parallax_corr,
                    r.heavy.dec_pmra_corr,
                    r.heavy.dec_pmdec_corr,
                    r.heavy.parallax_pmra_corr,
                    r.heavy.parallax_pmdec_corr,
                    r.heavy.pmra_pmdec_corr,
                ])?;
            }
        }

        light_tx.commit()?;
        heavy_tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CatalogRecord, HeavyAttrs, LightAttrs};
    use tempfile::TempDir;

    fn merged(offset: u64, key: i64, mag: f64) -> Result<MergedRecord> {
        Ok(MergedRecord {
            offset,
            record: CatalogRecord {
                source_key: key,
                ra: 100.0 + offset as f64,
                dec: -10.0,
                primary_mag: mag,
                light: LightAttrs {
                    parallax: Some(1.5),
                    ..LightAttrs::default()
                },
                heavy: HeavyAttrs {
                    source_id: 1000 + offset,
                    ..HeavyAttrs::default()
                },
            },
        })
    }

    #[test]
    fn test_load_writes_all_three_tables() {
        let dir = TempDir::new().unwrap();
        let light_path = dir.path().join("cat.sqlite3");

        let mut loader = BulkLoader::create(&light_path).unwrap();
        let stats = loader
            .load((0..5).map(|i| merged(i, i as i64 + 1, 10.0 + i as f64)))
            .unwrap();
        assert_eq!(stats.records, 5);
        assert_eq!(stats.batches, 1);

        let light = Connection::open(&light_path).unwrap();
        let n: i64 = light
            .query_row("SELECT COUNT(*) FROM star_rtree", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 5);
        let n: i64 = light
            .query_row("SELECT COUNT(*) FROM star_light", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 5);

        let heavy = Connection::open(heavy_path(&light_path)).unwrap();
        let n: i64 = heavy
            .query_row("SELECT COUNT(*) FROM star_heavy", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 5);
    }

    #[test]
    fn test_create_discards_previous_contents() {
        let dir = TempDir::new().unwrap();
        let light_path = dir.path().join("cat.sqlite3");

        let mut loader = BulkLoader::create(&light_path).unwrap();
        loader.load((0..3).map(|i| merged(i, i as i64 + 1, 9.0))).unwrap();
        drop(loader);

        let mut loader = BulkLoader::create(&light_path).unwrap();
        loader.load((0..1).map(|i| merged(i, 1, 9.0))).unwrap();
        drop(loader);

        let light = Connection::open(&light_path).unwrap();
        let n: i64 = light
            .query_row("SELECT COUNT(*) FROM star_light", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_nulls_persisted_as_nulls() {
        let dir = TempDir::new().unwrap();
        let light_path = dir.path().join("cat.sqlite3");

        let mut loader = BulkLoader::create(&light_path).unwrap();
        loader.load([merged(0, 1, 9.0)]).unwrap();
        drop(loader);

        let light = Connection::open(&light_path).unwrap();
        let pmra: Option<f64> = light
            .query_row("SELECT pmra FROM star_light WHERE idoffset = 0", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(pmra, None);
        let parallax: Option<f64> = light
            .query_row("SELECT parallax FROM star_light WHERE idoffset = 0", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(parallax, Some(1.5));
    }

    #[test]
    fn test_merge_error_aborts_load() {
        let dir = TempDir::new().unwrap();
        let light_path = dir.path().join("cat.sqlite3");

        let mut loader = BulkLoader::create(&light_path).unwrap();
        let stream = vec![
            merged(0, 1, 9.0),
            Err(crate::error::CatalogError::ShardOverlap {
                merged_hi: 5,
                incoming_lo: 3,
            }),
        ];
        assert!(loader.load(stream).is_err());
    }
}
