//! Persistent catalog store: SQLite R-tree index plus attribute tables.
//!
//! The store is split across two database files sharing the dense offset
//! as primary key:
//!
//! | File | Tables | Contents |
//! |------|--------|----------|
//! | `<name>.sqlite3` | `star_rtree`, `star_light` | rectangle index; ra, dec, magnitudes, parallax, proper motion |
//! | `<name>_heavy.sqlite3` | `star_heavy` | source id, measurement errors, correlations |
//!
//! The heavy file is attached by the query engine only when a query
//! requests heavy attributes. The lifecycle is load-then-serve: the
//! [`load::BulkLoader`] is the single exclusive writer, and once it
//! finishes the store is only ever opened read-only.

pub mod load;
pub mod query;

pub use load::{BulkLoader, LoadStats};
pub use query::{CatalogStore, QueryRect};

use std::path::{Path, PathBuf};

/// Path of the heavy companion store for a light store path:
/// `gaia.sqlite3` → `gaia_heavy.sqlite3`.
pub fn heavy_path(light_path: &Path) -> PathBuf {
    let stem = light_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog");
    let mut name = format!("{stem}_heavy");
    if let Some(ext) = light_path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    light_path.with_file_name(name)
}
