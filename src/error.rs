//! Error types for catalog ingestion and serving.
//!
//! Ingestion-time errors ([`ShardOverlap`](CatalogError::ShardOverlap),
//! [`EmptyShard`](CatalogError::EmptyShard), [`Store`](CatalogError::Store)
//! during a load) are fatal to the whole run: a partially loaded catalog is
//! never considered valid. Serve-time errors
//! ([`ShortRead`](CatalogError::ShortRead),
//! [`Protocol`](CatalogError::Protocol), [`Store`](CatalogError::Store)
//! during a query) are fatal only to the connection that triggered them.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Unified error type for merging, loading, querying, and serving.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two shards' native key ranges intersect. The merge refuses to emit
    /// any record from the offending shard.
    #[error(
        "shard key ranges overlap: incoming shard starts at {incoming_lo}, \
         previously merged keys reach {merged_hi}"
    )]
    ShardOverlap { merged_hi: i64, incoming_lo: i64 },

    /// A shard yielded zero records and the merge policy is
    /// [`EmptyShardPolicy::Fail`](crate::merge::EmptyShardPolicy::Fail).
    #[error("shard {path:?} contains no records")]
    EmptyShard { path: PathBuf },

    /// A shard file failed header or size validation.
    #[error("malformed shard file {path:?}: {reason}")]
    MalformedShard { path: PathBuf, reason: String },

    /// SQLite failure. Fatal to a bulk load; fatal to one connection at
    /// query time.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The peer closed the connection before a full 48-byte request
    /// arrived.
    #[error("connection closed after {got} of 48 request bytes")]
    ShortRead { got: usize },

    /// The request sentinel matched no known attribute-group encoding
    /// under either byte order.
    #[error("request sentinel {0} is not one of -1, -3, -5, -7 in either byte order")]
    Protocol(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
