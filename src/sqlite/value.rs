//! Conversions between SQL values and geometry values.
//!
//! Geometry-valued functions return a tagged blob: the header below followed
//! by the WKB body and, when present, the preserved GeoJSON members. Every
//! other WKB consumer can skip the first [`HEADER_LEN`] bytes and read it as
//! plain WKB.
//!
//! ```text
//! 0..4   magic  EE 'T' 'G' '0'
//! 4      version
//! 5      flags  bits 0-1 index kind, 0x04 extra json, 0x08 feature
//! 6..10  u32 LE length of the WKB body
//! ..     WKB body, then extra json text to the end
//! ```

use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::functions::Context;
use rusqlite::types::ValueRef;

use crate::codec::{geojson, looks_like_json, wkb, wkt};
use crate::config::IndexKind;
use crate::error::{Result, TgError};
use crate::geom::{Geom, IndexSettings};

/// Subtype SQLite's JSON functions attach to JSON text.
pub const JSON_SUBTYPE: u32 = 74;

const MAGIC: [u8; 4] = [0xEE, b'T', b'G', b'0'];
const VERSION: u8 = 1;
/// Bytes before the WKB body of a tagged blob.
pub const HEADER_LEN: usize = 10;

const FLAG_INDEX: u8 = 0x03;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_FEATURE: u8 = 0x08;

const INVALID_INPUT: &str =
    "invalid geometry input. Must be WKT (as text), WKB (as blob), or GeoJSON (as text).";

/// Geometry argument as it arrives from SQLite.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Input<'a> {
    /// Text; `json` is set when the value carries the JSON subtype.
    Text { bytes: &'a [u8], json: bool },
    /// Blob, tagged or plain WKB.
    Blob(&'a [u8]),
    /// NULL or a number.
    Other,
}

impl<'a> Input<'a> {
    pub(crate) fn new(value: ValueRef<'a>, subtype: u32) -> Self {
        match value {
            ValueRef::Text(bytes) => Input::Text {
                bytes,
                json: subtype == JSON_SUBTYPE,
            },
            ValueRef::Blob(bytes) => Input::Blob(bytes),
            ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => Input::Other,
        }
    }
}

/// Parses one geometry argument, building ring indexes with `settings`.
/// Tagged blobs keep the index kind they were created with.
pub(crate) fn decode(input: Input<'_>, settings: &IndexSettings) -> Result<Geom> {
    match input {
        Input::Text { bytes, json } => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| TgError::parse("invalid text: input is not valid UTF-8"))?;
            let geom = if json || looks_like_json(text) {
                geojson::parse(text)?
            } else {
                wkt::parse(text)?
            };
            Ok(geom.indexed(settings))
        }
        Input::Blob(bytes) if is_tagged(bytes) => from_tagged(bytes, settings),
        Input::Blob(bytes) => Ok(wkb::parse(bytes)?.indexed(settings)),
        Input::Other => Err(TgError::Type(INVALID_INPUT.into())),
    }
}

/// Whether the bytes start with the tagged-value header.
pub fn is_tagged(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_LEN && bytes[..4] == MAGIC
}

/// Serializes a geometry as a tagged blob.
pub fn to_tagged(geom: &Geom) -> Vec<u8> {
    let body = wkb::write(geom);
    let extra = geom.extra_json().unwrap_or_default();
    let mut flags = geom.index_kind().to_bits() & FLAG_INDEX;
    if !extra.is_empty() {
        flags |= FLAG_EXTRA;
    }
    if geom.is_feature() {
        flags |= FLAG_FEATURE;
    }
    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + extra.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(extra.as_bytes());
    out
}

/// Reads a tagged blob, rebuilding indexes of the recorded kind.
pub fn from_tagged(bytes: &[u8], settings: &IndexSettings) -> Result<Geom> {
    if !is_tagged(bytes) {
        return Err(TgError::parse("invalid binary: missing geometry header"));
    }
    if bytes[4] != VERSION {
        return Err(TgError::parse(format!(
            "invalid binary: unsupported geometry version {}",
            bytes[4]
        )));
    }
    let flags = bytes[5];
    let mut len = [0u8; 4];
    len.copy_from_slice(&bytes[6..HEADER_LEN]);
    let body_len = u32::from_le_bytes(len) as usize;
    let rest = &bytes[HEADER_LEN..];
    if body_len > rest.len() {
        return Err(TgError::parse("invalid binary: truncated geometry body"));
    }
    let (body, tail) = rest.split_at(body_len);
    let extra = if flags & FLAG_EXTRA != 0 {
        let text = std::str::from_utf8(tail)
            .map_err(|_| TgError::parse("invalid binary: extra json is not valid UTF-8"))?;
        Some(text.to_owned())
    } else if tail.is_empty() {
        None
    } else {
        return Err(TgError::parse("invalid binary: trailing bytes after geometry"));
    };
    let kind = IndexKind::from_bits(flags & FLAG_INDEX);
    Ok(wkb::parse(body)?
        .with_extra_json(extra)
        .with_feature(flags & FLAG_FEATURE != 0)
        .indexed(&settings.with_kind(kind)))
}

/// Parses argument `idx`, reusing the value SQLite keeps for constant
/// arguments across the rows of one statement.
pub(crate) fn geom_arg(
    ctx: &Context<'_>,
    idx: usize,
    settings: &IndexSettings,
) -> rusqlite::Result<Arc<Geom>> {
    let subtype = ctx.get_subtype(idx);
    ctx.get_or_create_aux(idx as c_int, |value| {
        decode(Input::new(value, subtype), settings)
    })
}

/// Parses argument `idx` without caching.
pub(crate) fn geom_arg_uncached(
    ctx: &Context<'_>,
    idx: usize,
    settings: &IndexSettings,
) -> Result<Geom> {
    decode(Input::new(ctx.get_raw(idx), ctx.get_subtype(idx)), settings)
}

/// Reads a numeric argument; `axis` names the coordinate in the error.
pub(crate) fn number_arg(ctx: &Context<'_>, idx: usize, axis: &str) -> Result<f64> {
    match ctx.get_raw(idx) {
        ValueRef::Integer(i) => Ok(i as f64),
        ValueRef::Real(f) => Ok(f),
        _ => Err(TgError::Type(format!(
            "point {axis} value must be an integer or float"
        ))),
    }
}
