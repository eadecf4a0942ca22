//! Read-only query engine over a loaded catalog store.
//!
//! A query is a rectangle on the sky plus a magnitude ceiling. Candidate
//! offsets come from the R-tree, the light table supplies the base
//! projection and filters on the primary magnitude, and the heavy table is
//! joined only when a query asks for heavy attributes. The heavy database
//! file is ATTACHed on first use, so a store without its heavy companion
//! serves base and light queries normally.
//!
//! Rectangle bounds are half-open: a star sitting exactly on the low RA or
//! Dec edge is included, one on the high edge is not. The magnitude
//! ceiling is strict — `primary_mag < ceiling`.

use crate::error::Result;
use crate::record::{AttrGroups, HeavyAttrs, LightAttrs, ResultRow};
use crate::store::heavy_path;
use rusqlite::{named_params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

/// Query rectangle in degrees. `ralo..rahi` and `declo..dechi` are
/// half-open; rectangles crossing the RA 0/360 seam are not supported and
/// must be split by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryRect {
    pub ralo: f64,
    pub rahi: f64,
    pub declo: f64,
    pub dechi: f64,
}

impl QueryRect {
    /// The whole sky.
    pub const FULL_SKY: QueryRect = QueryRect {
        ralo: 0.0,
        rahi: 360.0,
        declo: -90.0,
        dechi: 90.0,
    };
}

const BASE_COLUMNS: &str = "idx.idoffset, light.ra, light.dec, light.primary_mag";

const LIGHT_COLUMNS: &str = "light.parallax, light.pmra, light.pmdec, \
     light.secondary_mag1, light.secondary_mag2";

const HEAVY_COLUMNS: &str = "h.source_id, h.ra_error, h.dec_error, \
     h.parallax_error, h.pmra_error, h.pmdec_error, h.ra_dec_corr, \
     h.ra_parallax_corr, h.ra_pmra_corr, h.ra_pmdec_corr, \
     h.dec_parallax_corr, h.dec_pmra_corr, h.dec_pmdec_corr, \
     h.parallax_pmra_corr, h.parallax_pmdec_corr, h.pmra_pmdec_corr";

/// Compose the SELECT for one attribute-group combination.
///
/// The R-tree filter uses `lomag`, the brightest band of each star, so a
/// star can pass the index on a secondary band; the `primary_mag` predicate
/// on the light table is the authoritative ceiling.
fn select_sql(groups: AttrGroups) -> String {
    let mut columns = String::from(BASE_COLUMNS);
    if groups.light {
        columns.push_str(", ");
        columns.push_str(LIGHT_COLUMNS);
    }
    if groups.heavy {
        columns.push_str(", ");
        columns.push_str(HEAVY_COLUMNS);
    }

    let mut joins = String::from(
        "INNER JOIN star_light AS light ON light.idoffset = idx.idoffset",
    );
    if groups.heavy {
        joins.push_str(" INNER JOIN heavy.star_heavy AS h ON h.idoffset = idx.idoffset");
    }

    format!(
        "SELECT {columns} FROM star_rtree AS idx {joins} \
         WHERE idx.lomag < :ceiling \
           AND idx.rahi >= :ralo AND idx.ralo < :rahi \
           AND idx.dechi >= :declo AND idx.declo < :dechi \
           AND light.primary_mag < :ceiling \
         ORDER BY light.primary_mag ASC"
    )
}

fn map_row(row: &Row<'_>, groups: AttrGroups) -> rusqlite::Result<ResultRow> {
    let offset: i64 = row.get(0)?;
    let mut out = ResultRow {
        offset: offset as u32,
        ra: row.get(1)?,
        dec: row.get(2)?,
        primary_mag: row.get(3)?,
        light: None,
        heavy: None,
    };

    let mut col = 4;
    if groups.light {
        out.light = Some(LightAttrs {
            parallax: row.get(col)?,
            pmra: row.get(col + 1)?,
            pmdec: row.get(col + 2)?,
            secondary_mag1: row.get(col + 3)?,
            secondary_mag2: row.get(col + 4)?,
        });
        col += LightAttrs::NULLABLE_FIELDS;
    }
    if groups.heavy {
        let source_id: i64 = row.get(col)?;
        out.heavy = Some(HeavyAttrs {
            source_id: source_id as u64,
            ra_error: row.get(col + 1)?,
            dec_error: row.get(col + 2)?,
            parallax_error: row.get(col + 3)?,
            pmra_error: row.get(col + 4)?,
            pmdec_error: row.get(col + 5)?,
            ra_dec_corr: row.get(col + 6)?,
            ra_parallax_corr: row.get(col + 7)?,
            ra_pmra_corr: row.get(col + 8)?,
            ra_pmdec_corr: row.get(col + 9)?,
            dec_parallax_corr: row.get(col + 10)?,
            dec_pmra_corr: row.get(col + 11)?,
            dec_pmdec_corr: row.get(col + 12)?,
            parallax_pmra_corr: row.get(col + 13)?,
            parallax_pmdec_corr: row.get(col + 14)?,
            pmra_pmdec_corr: row.get(col + 15)?,
        });
    }
    Ok(out)
}

/// Read-only handle on a loaded catalog.
///
/// One handle serves one consumer; the server opens one per connection.
pub struct CatalogStore {
    conn: Connection,
    heavy_path: PathBuf,
    heavy_attached: bool,
}

impl CatalogStore {
    /// Open the light store read-only. The heavy companion is located by
    /// naming convention and attached lazily on the first heavy query.
    pub fn open(light_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            light_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(CatalogStore {
            conn,
            heavy_path: heavy_path(light_path),
            heavy_attached: false,
        })
    }

    fn ensure_heavy(&mut self) -> Result<()> {
        if !self.heavy_attached {
            self.conn.execute(
                "ATTACH DATABASE ?1 AS heavy",
                [self.heavy_path.to_string_lossy()],
            )?;
            self.heavy_attached = true;
        }
        Ok(())
    }

    /// Run one rectangle query. Rows come back ordered by primary
    /// magnitude ascending, brightest first.
    pub fn query(
        &mut self,
        rect: &QueryRect,
        mag_ceiling: f64,
        groups: AttrGroups,
    ) -> Result<Vec<ResultRow>> {
        if groups.heavy {
            self.ensure_heavy()?;
        }

        let sql = select_sql(groups);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            named_params! {
                ":ceiling": mag_ceiling,
                ":ralo": rect.ralo,
                ":rahi": rect.rahi,
                ":declo": rect.declo,
                ":dechi": rect.dechi,
            },
            |row| map_row(row, groups),
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
