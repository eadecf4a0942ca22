//! Shard merge iterator: many sorted shards in, one dense-offset stream out.
//!
//! Shards arrive ordered by first key **descending** (the directory-listing
//! convention of [`crate::shard::discover_shards`]); the merge consumes them
//! back to front so records emerge in ascending native-key order. Each
//! emitted record is annotated with a dense offset starting at 0 and
//! incrementing by exactly 1 — over the *emitted* stream, so sub-sampling
//! strides keep offsets dense.
//!
//! Key-range overlap between shards is a structural precondition, not
//! something the merge repairs: the highest key read so far is tracked, and
//! a shard whose lowest key does not exceed it fails the whole merge before
//! any of its records are emitted.

use crate::error::{CatalogError, Result};
use crate::record::CatalogRecord;

/// What to do when a shard yields zero records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyShardPolicy {
    /// Abort the merge with [`CatalogError::EmptyShard`].
    #[default]
    Fail,
    /// Skip the shard and continue.
    Skip,
}

/// Merge tuning knobs. `Default` processes every shard and every record.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Process every Nth shard (1 = all).
    pub shard_stride: usize,
    /// Within a shard, emit every Nth record (1 = all).
    pub record_stride: usize,
    pub empty_shards: EmptyShardPolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            shard_stride: 1,
            record_stride: 1,
            empty_shards: EmptyShardPolicy::default(),
        }
    }
}

/// One externally produced, internally sorted batch of catalog records.
///
/// A shard is read once, fully consumed, then discarded.
pub trait ShardSource {
    /// Lowest native key in the shard, used only for manifest ordering.
    fn first_key_hint(&self) -> i64;

    /// Human-readable identity for diagnostics (typically a path).
    fn label(&self) -> std::path::PathBuf;

    /// Drain the shard. Records need not arrive sorted; the merge sorts
    /// each shard by native key before emission.
    fn read_records(&mut self) -> Result<Vec<CatalogRecord>>;
}

/// A [`CatalogRecord`] annotated with its dense merge offset.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub offset: u64,
    pub record: CatalogRecord,
}

/// Lazy merge over an ordered collection of shard sources.
///
/// Yields `Result<MergedRecord>`; the first error is terminal and the
/// iterator is fused afterwards.
pub struct ShardMerge<S> {
    /// First-key descending; consumed from the back.
    pending: Vec<S>,
    current: std::vec::IntoIter<CatalogRecord>,
    options: MergeOptions,
    next_offset: u64,
    highest_key: Option<i64>,
    done: bool,
}

impl<S: ShardSource> ShardMerge<S> {
    /// Build a merge over `sources`, which must be ordered by first key
    /// descending. The shard stride is applied to this ordering before
    /// consumption begins.
    pub fn new(sources: Vec<S>, options: MergeOptions) -> Self {
        let stride = options.shard_stride.max(1);
        let pending: Vec<S> = sources.into_iter().step_by(stride).collect();
        ShardMerge {
            pending,
            current: Vec::new().into_iter(),
            options,
            next_offset: 0,
            highest_key: None,
            done: false,
        }
    }

    /// Pull in the next shard; returns `Ok(false)` when no shards remain.
    fn advance_shard(&mut self) -> Result<bool> {
        let Some(mut shard) = self.pending.pop() else {
            return Ok(false);
        };

        let mut records = shard.read_records()?;
        if records.is_empty() {
            return match self.options.empty_shards {
                EmptyShardPolicy::Fail => Err(CatalogError::EmptyShard {
                    path: shard.label(),
                }),
                EmptyShardPolicy::Skip => {
                    tracing::warn!(shard = ?shard.label(), "skipping empty shard");
                    self.advance_shard()
                }
            };
        }

        records.sort_by_key(|r| r.source_key);
        let shard_lo = records[0].source_key;
        let shard_hi = records[records.len() - 1].source_key;

        if let Some(merged_hi) = self.highest_key {
            if shard_lo <= merged_hi {
                return Err(CatalogError::ShardOverlap {
                    merged_hi,
                    incoming_lo: shard_lo,
                });
            }
        }
        // Track the shard's full key range even when striding skips its
        // extreme records.
        self.highest_key = Some(shard_hi);

        let stride = self.options.record_stride.max(1);
        let strided: Vec<CatalogRecord> = records.into_iter().step_by(stride).collect();
        self.current = strided.into_iter();
        Ok(true)
    }
}

impl<S: ShardSource> Iterator for ShardMerge<S> {
    type Item = Result<MergedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(record) = self.current.next() {
                let offset = self.next_offset;
                self.next_offset += 1;
                return Some(Ok(MergedRecord { offset, record }));
            }
            match self.advance_shard() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
