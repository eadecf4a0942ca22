//! Spatial star-catalog store with a binary TCP query server.
//!
//! Sorted catalog shards are merged into one dense-offset stream, bulk
//! loaded into a two-file SQLite store (an R-tree rectangle index plus
//! light and heavy attribute tables), then served over a minimal binary
//! protocol: 48-byte requests, fixed-layout response rows, connection
//! close as the end-of-results signal.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`record`] | [`CatalogRecord`](record::CatalogRecord), attribute groups, result rows |
//! | [`shard`] | On-disk shard files, [`discover_shards`](shard::discover_shards) |
//! | [`merge`] | [`ShardMerge`](merge::ShardMerge) iterator: overlap checking, dense offsets |
//! | [`store`] | [`BulkLoader`](store::BulkLoader) and the read-only [`CatalogStore`](store::CatalogStore) query engine |
//! | [`wire`] | Request/response encoding, sentinel byte-order negotiation |
//! | [`server`] | Tokio TCP server, one task per connection |
//! | [`client`] | Blocking query client |
//!
//! # Quick Start
//!
//! ```ignore
//! use starfield::record::AttrGroups;
//! use starfield::{client, wire::Request};
//!
//! // Stars brighter than magnitude 12 in a 10° × 10° field, with the
//! // light attribute group attached.
//! let request = Request::new(AttrGroups::LIGHT, 12.0, 80.0, 90.0, -10.0, 0.0);
//! let rows = client::fetch("127.0.0.1:13330", &request)?;
//! ```
//!
//! # Store Layout
//!
//! The store is two SQLite files sharing the dense offset as primary key:
//! `<name>.sqlite3` holds the `star_rtree` index and the `star_light`
//! table; `<name>_heavy.sqlite3` holds `star_heavy` and is attached only
//! when a query requests heavy attributes.
//!
//! # Features
//!
//! - **`cli`** — Enables the `forge` (shard ingestion) and `starserve`
//!   (query server) binaries.

pub mod client;
pub mod error;
pub mod merge;
pub mod record;
pub mod server;
pub mod shard;
pub mod store;
pub mod wire;

pub use error::{CatalogError, Result};
pub use record::{AttrGroups, CatalogRecord, ResultRow};
pub use store::{BulkLoader, CatalogStore, QueryRect};
