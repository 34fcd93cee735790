//! WKT, WKB, and GeoJSON parsers and serializers.
//!
//! Parsers return [`TgError::Parse`](crate::error::TgError::Parse) with a message
//! naming the failure class (`invalid text`, `invalid binary`, `invalid geojson`).
//! Serializers are deterministic: the same geometry always produces the same bytes.

pub mod geojson;
pub mod wkb;
pub mod wkt;

use std::fmt::Write as _;

use crate::error::Result;
use crate::geom::{Coord, Geom, Line, Ring};

/// Serialization format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Well-Known Text.
    Wkt,
    /// Well-Known Binary.
    Wkb,
    /// GeoJSON text.
    GeoJson,
}

/// Serialized geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Encoded {
    /// WKT or GeoJSON text.
    Text(String),
    /// WKB bytes.
    Binary(Vec<u8>),
}

/// Serializes a geometry in the requested format.
pub fn encode(geom: &Geom, format: Format) -> Encoded {
    match format {
        Format::Wkt => Encoded::Text(wkt::write(geom.shape())),
        Format::Wkb => Encoded::Binary(wkb::write(geom)),
        Format::GeoJson => Encoded::Text(geojson::write(geom)),
    }
}

/// Parses text as GeoJSON when it looks like a JSON object, WKT otherwise.
pub fn parse_text(text: &str) -> Result<Geom> {
    if looks_like_json(text) {
        geojson::parse(text)
    } else {
        wkt::parse(text)
    }
}

/// Whether text should be routed to the GeoJSON parser.
pub fn looks_like_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

/// Non-raising WKT validator.
pub fn valid_wkt(text: &str) -> bool {
    wkt::parse(text).is_ok()
}

/// Non-raising WKB validator.
pub fn valid_wkb(bytes: &[u8]) -> bool {
    wkb::parse(bytes).is_ok()
}

/// Non-raising GeoJSON validator.
pub fn valid_geojson(text: &str) -> bool {
    geojson::parse(text).is_ok()
}

/// Validates a linestring's position count.
pub(crate) fn line_from(points: Vec<Coord>) -> std::result::Result<Line, &'static str> {
    if points.len() == 1 {
        Err("linestrings need zero or at least two positions")
    } else {
        Ok(Line::new(points))
    }
}

/// Closes a ring and validates its position count.
pub(crate) fn ring_from(points: Vec<Coord>) -> std::result::Result<Ring, &'static str> {
    let ring = Ring::new(points);
    if ring.points().len() < 4 {
        Err("rings need at least three distinct positions")
    } else {
        Ok(ring)
    }
}

/// Magnitude from which numbers switch to exponent form (2^53).
const EXPONENT_ABOVE: f64 = 9_007_199_254_740_992.0;
/// Magnitude below which numbers switch to exponent form.
const EXPONENT_BELOW: f64 = 1e-6;

/// Appends a coordinate value in canonical form: integral values within
/// ±2^53 carry no fractional part, others use the shortest representation
/// that round-trips. Very large or very small magnitudes use exponent form.
pub(crate) fn write_num(out: &mut String, v: f64) {
    let magnitude = v.abs();
    if v == 0.0 {
        out.push('0');
    } else if magnitude >= EXPONENT_ABOVE || magnitude < EXPONENT_BELOW {
        let _ = write!(out, "{v:e}");
    } else {
        let _ = write!(out, "{v}");
    }
}
