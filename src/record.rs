//! Shared record vocabulary: catalog records, attribute groups, result rows.
//!
//! A [`CatalogRecord`] is one astronomical point as it travels through the
//! merge and load pipeline. Its persisted projection is one rectangle-index
//! row plus one [`LightAttrs`] row and one [`HeavyAttrs`] row, all keyed by
//! the dense offset assigned at merge time.
//!
//! Optional attributes are `Option<f64>` — an absent column in a shard's
//! schema becomes `None`, never zero. The wire protocol carries nullness in
//! a separate bitmask; see [`crate::wire`].

/// Which attribute groups a query wants joined and sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrGroups {
    /// Join and send the light attribute row (parallax, proper motion,
    /// secondary magnitudes).
    pub light: bool,
    /// Join and send the heavy attribute row (source id, errors,
    /// correlations). Requires the heavy store to be attached.
    pub heavy: bool,
}

impl AttrGroups {
    /// Base row only.
    pub const NONE: AttrGroups = AttrGroups {
        light: false,
        heavy: false,
    };
    /// Base + light rows.
    pub const LIGHT: AttrGroups = AttrGroups {
        light: true,
        heavy: false,
    };
    /// Base + heavy rows.
    pub const HEAVY: AttrGroups = AttrGroups {
        light: false,
        heavy: true,
    };
    /// Base + light + heavy rows.
    pub const ALL: AttrGroups = AttrGroups {
        light: true,
        heavy: true,
    };
}

/// Frequently requested optional attributes, stored in the light table.
///
/// Field order here is the wire order: bit *i* of the light null bitmask
/// refers to `fields()[i]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightAttrs {
    /// Trigonometric parallax, milliarcseconds.
    pub parallax: Option<f64>,
    /// Proper motion in RA (including cos δ factor), mas/yr.
    pub pmra: Option<f64>,
    /// Proper motion in declination, mas/yr.
    pub pmdec: Option<f64>,
    /// First secondary magnitude band.
    pub secondary_mag1: Option<f64>,
    /// Second secondary magnitude band.
    pub secondary_mag2: Option<f64>,
}

impl LightAttrs {
    /// Number of nullable light fields carried on the wire.
    pub const NULLABLE_FIELDS: usize = 5;

    /// Fields in wire order.
    pub fn fields(&self) -> [Option<f64>; Self::NULLABLE_FIELDS] {
        [
            self.parallax,
            self.pmra,
            self.pmdec,
            self.secondary_mag1,
            self.secondary_mag2,
        ]
    }

    /// Null bitmask: bit *i* set iff field *i* is null.
    pub fn null_mask(&self) -> u32 {
        let mut mask = 0u32;
        for (i, field) in self.fields().iter().enumerate() {
            if field.is_none() {
                mask |= 1 << i;
            }
        }
        mask
    }
}

/// Rarely requested attributes, stored in the (possibly separate) heavy
/// store: stable external identifier, measurement errors, pairwise
/// correlation coefficients.
///
/// `source_id` is never null and is excluded from the null bitmask; bit
/// *i* of the heavy mask refers to `fields()[i]`, the *i + 1*-th heavy
/// column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeavyAttrs {
    /// Stable external catalog identifier. Never null.
    pub source_id: u64,
    pub ra_error: Option<f64>,
    pub dec_error: Option<f64>,
    pub parallax_error: Option<f64>,
    pub pmra_error: Option<f64>,
    pub pmdec_error: Option<f64>,
    pub ra_dec_corr: Option<f64>,
    pub ra_parallax_corr: Option<f64>,
    pub ra_pmra_corr: Option<f64>,
    pub ra_pmdec_corr: Option<f64>,
    pub dec_parallax_corr: Option<f64>,
    pub dec_pmra_corr: Option<f64>,
    pub dec_pmdec_corr: Option<f64>,
    pub parallax_pmra_corr: Option<f64>,
    pub parallax_pmdec_corr: Option<f64>,
    pub pmra_pmdec_corr: Option<f64>,
}

impl HeavyAttrs {
    /// Number of nullable heavy fields carried on the wire.
    pub const NULLABLE_FIELDS: usize = 15;

    /// Nullable fields in wire order (`source_id` excluded).
    pub fn fields(&self) -> [Option<f64>; Self::NULLABLE_FIELDS] {
        [
            self.ra_error,
            self.dec_error,
            self.parallax_error,
            self.pmra_error,
            self.pmdec_error,
            self.ra_dec_corr,
            self.ra_parallax_corr,
            self.ra_pmra_corr,
            self.ra_pmdec_corr,
            self.dec_parallax_corr,
            self.dec_pmra_corr,
            self.dec_pmdec_corr,
            self.parallax_pmra_corr,
            self.parallax_pmdec_corr,
            self.pmra_pmdec_corr,
        ]
    }

    /// Null bitmask: bit *i* set iff nullable field *i* is null.
    pub fn null_mask(&self) -> u64 {
        let mut mask = 0u64;
        for (i, field) in self.fields().iter().enumerate() {
            if field.is_none() {
                mask |= 1 << i;
            }
        }
        mask
    }
}

/// One astronomical point record, transient between merge and load.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    /// Source-assigned monotonic key used for shard ordering (not the
    /// dense offset, which exists only after merging).
    pub source_key: i64,
    /// Right ascension, degrees.
    pub ra: f64,
    /// Declination, degrees.
    pub dec: f64,
    /// Primary magnitude band. Required; defines result ordering.
    pub primary_mag: f64,
    pub light: LightAttrs,
    pub heavy: HeavyAttrs,
}

impl CatalogRecord {
    /// Minimum and maximum over the magnitude bands actually present.
    ///
    /// A record with only the primary band returns `(m, m)`.
    pub fn mag_range(&self) -> (f64, f64) {
        let mut lo = self.primary_mag;
        let mut hi = self.primary_mag;
        for band in [self.light.secondary_mag1, self.light.secondary_mag2]
            .into_iter()
            .flatten()
        {
            if band < lo {
                lo = band;
            }
            if band > hi {
                hi = band;
            }
        }
        (lo, hi)
    }
}

/// One row of a query result: the base projection plus any joined groups.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Dense offset, primary key across all persisted tables.
    pub offset: u32,
    pub ra: f64,
    pub dec: f64,
    pub primary_mag: f64,
    /// Present iff the light group was requested.
    pub light: Option<LightAttrs>,
    /// Present iff the heavy group was requested.
    pub heavy: Option<HeavyAttrs>,
}
