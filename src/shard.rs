//! Binary shard files: the on-disk seam between external ingestion and the
//! merge pipeline.
//!
//! A shard file holds one externally produced batch of catalog records:
//!
//! 1. **Header** (32 bytes) — magic, version, record count, key range
//! 2. **Records** (`count × 208` bytes) — fixed layout, little-endian
//!
//! Record layout: native key `i64`, source id `u64`, ra/dec/primary
//! magnitude `f64`, a `u32` null bitmask over the 20 optional fields
//! (5 light then 15 heavy, wire order), 4 reserved bytes, then 20 `f64`
//! slots (zero-filled when null; the bitmask is authoritative).
//!
//! [`ShardWriter`] streams records and patches the header on
//! [`finish`](ShardWriter::finish); [`ShardFile`] validates the header on
//! open and implements [`ShardSource`] for the merge.

use crate::error::{CatalogError, Result};
use crate::merge::ShardSource;
use crate::record::{CatalogRecord, HeavyAttrs, LightAttrs};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SHARD_MAGIC: &[u8; 4] = b"SHRD";
const SHARD_VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const RECORD_SIZE: usize = 208;
const OPTIONAL_SLOTS: usize =
    LightAttrs::NULLABLE_FIELDS + HeavyAttrs::NULLABLE_FIELDS;

/// Extension used by [`discover_shards`].
pub const SHARD_EXTENSION: &str = "shard";

/// Metadata parsed from the first 32 bytes of a shard file.
#[derive(Debug, Clone)]
pub struct ShardHeader {
    pub count: u64,
    /// Lowest native key in the shard.
    pub key_lo: i64,
    /// Highest native key in the shard.
    pub key_hi: i64,
}

/// An openable, once-readable shard file.
#[derive(Debug)]
pub struct ShardFile {
    path: PathBuf,
    header: ShardHeader,
}

impl ShardFile {
    /// Open a shard file and validate its header. No records are read
    /// until the merge drains the shard.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|_| malformed(&path, "file shorter than header"))?;

        if &header_bytes[0..4] != SHARD_MAGIC {
            return Err(malformed(&path, "bad magic"));
        }
        let version = u32::from_le_bytes(header_bytes[4..8].try_into().unwrap());
        if version != SHARD_VERSION {
            return Err(malformed(&path, &format!("unsupported version {version}")));
        }
        let count = u64::from_le_bytes(header_bytes[8..16].try_into().unwrap());
        let key_lo = i64::from_le_bytes(header_bytes[16..24].try_into().unwrap());
        let key_hi = i64::from_le_bytes(header_bytes[24..32].try_into().unwrap());

        let expected = HEADER_SIZE as u64 + count * RECORD_SIZE as u64;
        let actual = fs::metadata(&path)?.len();
        if actual != expected {
            return Err(malformed(
                &path,
                &format!("size {actual} != expected {expected} for {count} records"),
            ));
        }

        Ok(ShardFile {
            path,
            header: ShardHeader {
                count,
                key_lo,
                key_hi,
            },
        })
    }

    pub fn header(&self) -> &ShardHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ShardSource for ShardFile {
    fn first_key_hint(&self) -> i64 {
        self.header.key_lo
    }

    fn label(&self) -> PathBuf {
        self.path.clone()
    }

    fn read_records(&mut self) -> Result<Vec<CatalogRecord>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        let mut records = Vec::with_capacity(self.header.count as usize);
        let mut buf = [0u8; RECORD_SIZE];
        for _ in 0..self.header.count {
            reader.read_exact(&mut buf)?;
            records.push(decode_record(&buf));
        }
        Ok(records)
    }
}

/// List `*.shard` files in a directory, ordered by first key descending —
/// the ordering [`crate::merge::ShardMerge::new`] expects.
pub fn discover_shards(dir: impl AsRef<Path>) -> Result<Vec<ShardFile>> {
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == SHARD_EXTENSION) {
            shards.push(ShardFile::open(&path)?);
        }
    }
    shards.sort_by_key(|s| std::cmp::Reverse(s.first_key_hint()));
    Ok(shards)
}

/// Streams records into a shard file, tracking count and key range, and
/// patches the placeholder header on [`finish`](Self::finish).
pub struct ShardWriter {
    writer: BufWriter<File>,
    count: u64,
    key_lo: i64,
    key_hi: i64,
}

impl ShardWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; HEADER_SIZE])?;
        Ok(ShardWriter {
            writer,
            count: 0,
            key_lo: i64::MAX,
            key_hi: i64::MIN,
        })
    }

    pub fn add(&mut self, record: &CatalogRecord) -> Result<()> {
        let buf = encode_record(record);
        self.writer.write_all(&buf)?;
        self.count += 1;
        self.key_lo = self.key_lo.min(record.source_key);
        self.key_hi = self.key_hi.max(record.source_key);
        Ok(())
    }

    /// Flush records and write the final header. Returns the record count.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(SHARD_MAGIC)?;
        file.write_all(&SHARD_VERSION.to_le_bytes())?;
        file.write_all(&self.count.to_le_bytes())?;
        file.write_all(&self.key_lo.to_le_bytes())?;
        file.write_all(&self.key_hi.to_le_bytes())?;
        Ok(self.count)
    }
}

fn malformed(path: &Path, reason: &str) -> CatalogError {
    CatalogError::MalformedShard {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn encode_record(record: &CatalogRecord) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&record.source_key.to_le_bytes());
    buf[8..16].copy_from_slice(&record.heavy.source_id.to_le_bytes());
    buf[16..24].copy_from_slice(&record.ra.to_le_bytes());
    buf[24..32].copy_from_slice(&record.dec.to_le_bytes());
    buf[32..40].copy_from_slice(&record.primary_mag.to_le_bytes());

    let mut optional = [None; OPTIONAL_SLOTS];
    optional[..LightAttrs::NULLABLE_FIELDS].copy_from_slice(&record.light.fields());
    optional[LightAttrs::NULLABLE_FIELDS..].copy_from_slice(&record.heavy.fields());

    let mut mask = 0u32;
    for (i, slot) in optional.iter().enumerate() {
        let start = 48 + i * 8;
        match slot {
            Some(v) => buf[start..start + 8].copy_from_slice(&v.to_le_bytes()),
            None => mask |= 1 << i,
        }
    }
    buf[40..44].copy_from_slice(&mask.to_le_bytes());
    buf
}

fn decode_record(buf: &[u8; RECORD_SIZE]) -> CatalogRecord {
    let mask = u32::from_le_bytes(buf[40..44].try_into().unwrap());
    let slot = |i: usize| -> Option<f64> {
        if mask & (1 << i) != 0 {
            return None;
        }
        let start = 48 + i * 8;
        Some(f64::from_le_bytes(buf[start..start + 8].try_into().unwrap()))
    };

    CatalogRecord {
        source_key: i64::from_le_bytes(buf[0..8].try_into().unwrap()),
        ra: f64::from_le_bytes(buf[16..24].try_into().unwrap()),
        dec: f64::from_le_bytes(buf[24..32].try_into().unwrap()),
        primary_mag: f64::from_le_bytes(buf[32..40].try_into().unwrap()),
        light: LightAttrs {
            parallax: slot(0),
            pmra: slot(1),
            pmdec: slot(2),
            secondary_mag1: slot(3),
            secondary_mag2: slot(4),
        },
        heavy: HeavyAttrs {
            source_id: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            ra_error: slot(5),
            dec_error: slot(6),
            parallax_error: slot(7),
            pmra_error: slot(8),
            pmdec_error: slot(9),
            ra_dec_corr: slot(10),
            ra_parallax_corr: slot(11),
            ra_pmra_corr: slot(12),
            ra_pmdec_corr: slot(13),
            dec_parallax_corr: slot(14),
            dec_pmra_corr: slot(15),
            dec_pmdec_corr: slot(16),
            parallax_pmra_corr: slot(17),
            parallax_pmdec_corr: slot(18),
            pmra_pmdec_corr: slot(19),
        },
    }
}
