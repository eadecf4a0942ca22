//! Self-describing binary wire protocol.
//!
//! A request is exactly 48 bytes: six 8-byte floats. The first field is a
//! sentinel drawn from a small set of negative odd values that encodes both
//! byte-order validity and the requested attribute groups:
//!
//! | sentinel | groups |
//! |----------|--------------------|
//! | -1.0     | base               |
//! | -3.0     | base + light       |
//! | -5.0     | base + heavy       |
//! | -7.0     | base + light + heavy |
//!
//! Decoding tries little-endian first, then big-endian; if neither yields a
//! known sentinel the request is malformed. The negotiated order applies to
//! the whole response. There is no other handshake.
//!
//! A response is a stream of fixed-layout records, one per result row, with
//! no framing and no count; the client detects completion by connection
//! close. Null optional fields are carried as a 0.0 placeholder with the
//! corresponding bit set in the group's null bitmask — the bitmask is
//! authoritative, the placeholder value is not.

use crate::error::{CatalogError, Result};
use crate::record::{AttrGroups, HeavyAttrs, LightAttrs, ResultRow};

/// Request size on the wire: 6 × 8-byte floats.
pub const REQUEST_SIZE: usize = 48;
/// Base group: offset `u32` + ra, dec, primary magnitude as `f64`.
pub const BASE_ROW_SIZE: usize = 28;
/// Light group: `u32` null bitmask + 5 × `f64`.
pub const LIGHT_ROW_SIZE: usize = 44;
/// Heavy group: `u64` null bitmask + `u64` source id + 15 × `f64`.
pub const HEAVY_ROW_SIZE: usize = 136;

const SENTINELS: [(f64, AttrGroups); 4] = [
    (-1.0, AttrGroups::NONE),
    (-3.0, AttrGroups::LIGHT),
    (-5.0, AttrGroups::HEAVY),
    (-7.0, AttrGroups::ALL),
];

/// Byte order negotiated by the request sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn get_f64(self, buf: &[u8]) -> f64 {
        let bytes: [u8; 8] = buf[..8].try_into().unwrap();
        match self {
            ByteOrder::Little => f64::from_le_bytes(bytes),
            ByteOrder::Big => f64::from_be_bytes(bytes),
        }
    }

    fn put_f64(self, out: &mut Vec<u8>, v: f64) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_u32(self, out: &mut Vec<u8>, v: u32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_u64(self, out: &mut Vec<u8>, v: u64) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn get_u32(self, buf: &[u8]) -> u32 {
        let bytes: [u8; 4] = buf[..4].try_into().unwrap();
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    fn get_u64(self, buf: &[u8]) -> u64 {
        let bytes: [u8; 8] = buf[..8].try_into().unwrap();
        match self {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        }
    }
}

/// One decoded client query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    pub groups: AttrGroups,
    /// Byte order the request arrived in; responses use the same order.
    pub order: ByteOrder,
    /// Exclusive upper bound on primary magnitude.
    pub mag_ceiling: f64,
    pub ralo: f64,
    pub rahi: f64,
    pub declo: f64,
    pub dechi: f64,
}

impl Request {
    /// Build a little-endian request (the client-side default).
    pub fn new(
        groups: AttrGroups,
        mag_ceiling: f64,
        ralo: f64,
        rahi: f64,
        declo: f64,
        dechi: f64,
    ) -> Self {
        Request {
            groups,
            order: ByteOrder::Little,
            mag_ceiling,
            ralo,
            rahi,
            declo,
            dechi,
        }
    }

    /// Decode a 48-byte request, negotiating byte order via the sentinel.
    pub fn decode(buf: &[u8; REQUEST_SIZE]) -> Result<Request> {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let sentinel = order.get_f64(&buf[0..8]);
            let Some(groups) = sentinel_groups(sentinel) else {
                continue;
            };
            return Ok(Request {
                groups,
                order,
                mag_ceiling: order.get_f64(&buf[8..16]),
                ralo: order.get_f64(&buf[16..24]),
                rahi: order.get_f64(&buf[24..32]),
                declo: order.get_f64(&buf[32..40]),
                dechi: order.get_f64(&buf[40..48]),
            });
        }
        Err(CatalogError::Protocol(ByteOrder::Little.get_f64(&buf[0..8])))
    }

    /// Encode this request in its own byte order.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut out = Vec::with_capacity(REQUEST_SIZE);
        self.order.put_f64(&mut out, groups_sentinel(self.groups));
        self.order.put_f64(&mut out, self.mag_ceiling);
        self.order.put_f64(&mut out, self.ralo);
        self.order.put_f64(&mut out, self.rahi);
        self.order.put_f64(&mut out, self.declo);
        self.order.put_f64(&mut out, self.dechi);
        out.try_into().unwrap()
    }
}

fn sentinel_groups(sentinel: f64) -> Option<AttrGroups> {
    SENTINELS
        .iter()
        .find(|(s, _)| *s == sentinel)
        .map(|(_, g)| *g)
}

fn groups_sentinel(groups: AttrGroups) -> f64 {
    SENTINELS
        .iter()
        .find(|(_, g)| *g == groups)
        .map(|(s, _)| *s)
        .unwrap_or(-1.0)
}

/// Total bytes per response row for the given groups.
pub fn row_size(groups: AttrGroups) -> usize {
    let mut size = BASE_ROW_SIZE;
    if groups.light {
        size += LIGHT_ROW_SIZE;
    }
    if groups.heavy {
        size += HEAVY_ROW_SIZE;
    }
    size
}

/// Append one response row to `out` in the negotiated byte order.
pub fn encode_row(row: &ResultRow, groups: AttrGroups, order: ByteOrder, out: &mut Vec<u8>) {
    order.put_u32(out, row.offset);
    order.put_f64(out, row.ra);
    order.put_f64(out, row.dec);
    order.put_f64(out, row.primary_mag);

    if groups.light {
        let light = row.light.unwrap_or_default();
        order.put_u32(out, light.null_mask());
        for field in light.fields() {
            order.put_f64(out, field.unwrap_or(0.0));
        }
    }

    if groups.heavy {
        let heavy = row.heavy.unwrap_or_default();
        order.put_u64(out, heavy.null_mask());
        order.put_u64(out, heavy.source_id);
        for field in heavy.fields() {
            order.put_f64(out, field.unwrap_or(0.0));
        }
    }
}

/// Decode one response row. `buf` must be exactly `row_size(groups)` long.
pub fn decode_row(buf: &[u8], groups: AttrGroups, order: ByteOrder) -> ResultRow {
    debug_assert_eq!(buf.len(), row_size(groups));

    let offset = order.get_u32(&buf[0..4]);
    let ra = order.get_f64(&buf[4..12]);
    let dec = order.get_f64(&buf[12..20]);
    let primary_mag = order.get_f64(&buf[20..28]);
    let mut pos = BASE_ROW_SIZE;

    let light = groups.light.then(|| {
        let mask = order.get_u32(&buf[pos..pos + 4]);
        let field = |i: usize| -> Option<f64> {
            if mask & (1 << i) != 0 {
                return None;
            }
            Some(order.get_f64(&buf[pos + 4 + i * 8..pos + 12 + i * 8]))
        };
        let light = LightAttrs {
            parallax: field(0),
            pmra: field(1),
            pmdec: field(2),
            secondary_mag1: field(3),
            secondary_mag2: field(4),
        };
        pos += LIGHT_ROW_SIZE;
        light
    });

    let heavy = groups.heavy.then(|| {
        let mask = order.get_u64(&buf[pos..pos + 8]);
        let source_id = order.get_u64(&buf[pos + 8..pos + 16]);
        let field = |i: usize| -> Option<f64> {
            if mask & (1 << i) != 0 {
                return None;
            }
            Some(order.get_f64(&buf[pos + 16 + i * 8..pos + 24 + i * 8]))
        };
        HeavyAttrs {
            source_id,
            ra_error: field(0),
            dec_error: field(1),
            parallax_error: field(2),
            pmra_error: field(3),
            pmdec_error: field(4),
            ra_dec_corr: field(5),
            ra_parallax_corr: field(6),
            ra_pmra_corr: field(7),
            ra_pmdec_corr: field(8),
            dec_parallax_corr: field(9),
            dec_pmra_corr: field(10),
            dec_pmdec_corr: field(11),
            parallax_pmra_corr: field(12),
            parallax_pmdec_corr: field(13),
            pmra_pmdec_corr: field(14),
        }
    });

    ResultRow {
        offset,
        ra,
        dec,
        primary_mag,
        light,
        heavy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> ResultRow {
        ResultRow {
            offset: 383_657_976,
            ra: 123.651832,
            dec: -44.169624,
            primary_mag: 20.312470,
            light: Some(LightAttrs {
                parallax: Some(0.25),
                pmra: None,
                pmdec: Some(-3.5),
                secondary_mag1: Some(17.843435),
                secondary_mag2: None,
            }),
            heavy: Some(HeavyAttrs {
                source_id: 5_520_900_294_000_500_480,
                ra_error: Some(0.125),
                dec_error: None,
                pmra_pmdec_corr: Some(-0.5),
                ..HeavyAttrs::default()
            }),
        }
    }

    #[test]
    fn test_request_decode_little_endian() {
        let request = Request::new(AttrGroups::LIGHT, 15.0, 10.0, 20.0, -5.0, 5.0);
        let decoded = Request::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_decode_big_endian_fallback() {
        let request = Request {
            order: ByteOrder::Big,
            ..Request::new(AttrGroups::NONE, 99.0, 0.0, 360.0, -90.0, 90.0)
        };
        let decoded = Request::decode(&request.encode()).unwrap();
        assert_eq!(decoded.order, ByteOrder::Big);
        assert_eq!(decoded.groups, AttrGroups::NONE);
        assert_eq!(decoded.mag_ceiling, 99.0);
        assert_eq!(decoded.rahi, 360.0);
    }

    #[test]
    fn test_request_all_sentinels() {
        for (sentinel, groups) in SENTINELS {
            let mut buf = [0u8; REQUEST_SIZE];
            buf[0..8].copy_from_slice(&sentinel.to_le_bytes());
            let decoded = Request::decode(&buf).unwrap();
            assert_eq!(decoded.groups, groups);
        }
    }

    #[test]
    fn test_request_bad_sentinel() {
        let mut buf = [0u8; REQUEST_SIZE];
        buf[0..8].copy_from_slice(&2.0f64.to_le_bytes());
        let err = Request::decode(&buf).unwrap_err();
        assert!(matches!(err, CatalogError::Protocol(_)));
    }

    #[test]
    fn test_row_sizes() {
        assert_eq!(row_size(AttrGroups::NONE), 28);
        assert_eq!(row_size(AttrGroups::LIGHT), 72);
        assert_eq!(row_size(AttrGroups::HEAVY), 164);
        assert_eq!(row_size(AttrGroups::ALL), 208);
    }

    #[test]
    fn test_encoded_row_length_matches_row_size() {
        let row = sample_row();
        for groups in [
            AttrGroups::NONE,
            AttrGroups::LIGHT,
            AttrGroups::HEAVY,
            AttrGroups::ALL,
        ] {
            let mut out = Vec::new();
            encode_row(&row, groups, ByteOrder::Little, &mut out);
            assert_eq!(out.len(), row_size(groups));
        }
    }

    #[test]
    fn test_row_round_trip_both_orders() {
        let row = sample_row();
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let mut out = Vec::new();
            encode_row(&row, AttrGroups::ALL, order, &mut out);
            let decoded = decode_row(&out, AttrGroups::ALL, order);
            assert_eq!(decoded, row);
        }
    }

    #[test]
    fn test_base_only_row_omits_groups() {
        let row = sample_row();
        let mut out = Vec::new();
        encode_row(&row, AttrGroups::NONE, ByteOrder::Little, &mut out);
        let decoded = decode_row(&out, AttrGroups::NONE, ByteOrder::Little);
        assert_eq!(decoded.offset, row.offset);
        assert!(decoded.light.is_none());
        assert!(decoded.heavy.is_none());
    }

    #[test]
    fn test_bitmask_authoritative_over_placeholder() {
        // Corrupt the null field's placeholder bytes; a conformant decoder
        // must still report None because the bitmask bit is set.
        let row = sample_row();
        let mut out = Vec::new();
        encode_row(&row, AttrGroups::LIGHT, ByteOrder::Little, &mut out);

        // pmra (light field 1) is null; its payload starts after the base
        // row plus the 4-byte mask plus one field.
        let pmra_start = BASE_ROW_SIZE + 4 + 8;
        out[pmra_start..pmra_start + 8].copy_from_slice(&f64::MAX.to_le_bytes());

        let decoded = decode_row(&out, AttrGroups::LIGHT, ByteOrder::Little);
        assert_eq!(decoded.light.unwrap().pmra, None);
    }
}
