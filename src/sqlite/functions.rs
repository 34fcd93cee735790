//! Scalar SQL functions.

use rusqlite::functions::{Context, FunctionFlags, SubType};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::value::{
    from_tagged, geom_arg, geom_arg_uncached, is_tagged, number_arg, to_tagged, JSON_SUBTYPE,
};
use crate::codec::{self, geojson, Encoded, Format};
use crate::config::{IndexKind, TgOptions};
use crate::error::{Result, TgError};
use crate::geom::{build, Geom, IndexSettings};
use crate::predicate::Predicate;

/// One scalar function body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scalar {
    /// `tg_version()`
    Version,
    /// `tg_debug()`
    Debug,
    /// `tg_type(geom)`
    Type,
    /// `tg_geom(geom)`
    Geom,
    /// `tg_geom(geom, index)`
    GeomIndexed,
    /// `tg_point(x, y)`
    Point,
    /// `tg_point_wkt`, `tg_point_wkb`, `tg_point_geojson`
    PointAs(Format),
    /// `tg_multipoint(p0, .., pn)`
    MultiPoint,
    /// `tg_line(p0, .., pn)`
    Line,
    /// `tg_poly_exterior(geom)`
    PolyExterior,
    /// `tg_to_wkt`, `tg_to_wkb`, `tg_to_geojson`
    To(Format),
    /// `tg_valid_wkt`, `tg_valid_wkb`, `tg_valid_geojson`
    Valid(Format),
    /// `tg_extra_json(geom)`
    ExtraJson,
    /// `tg_intersects(a, b)` and the other relations.
    Predicate(Predicate),
}

/// Every scalar function as `(name, argument count, body)`; `-1` is variadic.
pub const SCALARS: [(&str, i32, Scalar); 26] = [
    ("tg_version", 0, Scalar::Version),
    ("tg_debug", 0, Scalar::Debug),
    ("tg_type", 1, Scalar::Type),
    ("tg_geom", 1, Scalar::Geom),
    ("tg_geom", 2, Scalar::GeomIndexed),
    ("tg_point", 2, Scalar::Point),
    ("tg_point_wkt", 2, Scalar::PointAs(Format::Wkt)),
    ("tg_point_wkb", 2, Scalar::PointAs(Format::Wkb)),
    ("tg_point_geojson", 2, Scalar::PointAs(Format::GeoJson)),
    ("tg_multipoint", -1, Scalar::MultiPoint),
    ("tg_line", -1, Scalar::Line),
    ("tg_poly_exterior", 1, Scalar::PolyExterior),
    ("tg_to_wkt", 1, Scalar::To(Format::Wkt)),
    ("tg_to_wkb", 1, Scalar::To(Format::Wkb)),
    ("tg_to_geojson", 1, Scalar::To(Format::GeoJson)),
    ("tg_valid_wkt", 1, Scalar::Valid(Format::Wkt)),
    ("tg_valid_wkb", 1, Scalar::Valid(Format::Wkb)),
    ("tg_valid_geojson", 1, Scalar::Valid(Format::GeoJson)),
    ("tg_extra_json", 1, Scalar::ExtraJson),
    ("tg_intersects", 2, Scalar::Predicate(Predicate::Intersects)),
    ("tg_disjoint", 2, Scalar::Predicate(Predicate::Disjoint)),
    ("tg_contains", 2, Scalar::Predicate(Predicate::Contains)),
    ("tg_within", 2, Scalar::Predicate(Predicate::Within)),
    ("tg_covers", 2, Scalar::Predicate(Predicate::Covers)),
    ("tg_coveredby", 2, Scalar::Predicate(Predicate::CoveredBy)),
    ("tg_touches", 2, Scalar::Predicate(Predicate::Touches)),
];

impl Scalar {
    fn flags(self) -> FunctionFlags {
        let base = FunctionFlags::SQLITE_UTF8
            | FunctionFlags::SQLITE_DETERMINISTIC
            | FunctionFlags::SQLITE_INNOCUOUS;
        match self {
            Scalar::Version | Scalar::Debug | Scalar::Point | Scalar::PointAs(_) => base,
            Scalar::To(Format::GeoJson) | Scalar::ExtraJson => {
                base | FunctionFlags::SQLITE_SUBTYPE | FunctionFlags::SQLITE_RESULT_SUBTYPE
            }
            _ => base | FunctionFlags::SQLITE_SUBTYPE,
        }
    }
}

/// Extension version, `v` followed by the package version.
pub fn version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

/// Three-line diagnostic text returned by `tg_debug()`.
pub fn debug_text(opts: &TgOptions) -> String {
    format!(
        "sqlite-tg version: {}\nsqlite-tg features: default_index={},tg0,each,bbox\nsqlite version: {}",
        version(),
        opts.default_index.name(),
        rusqlite::version()
    )
}

fn fail(err: TgError) -> rusqlite::Error {
    err.into_function_error()
}

fn json(text: String) -> (String, SubType) {
    (text, Some(JSON_SUBTYPE))
}

/// Registers one scalar function under `name`.
pub(crate) fn register(
    conn: &Connection,
    name: &str,
    n_arg: i32,
    scalar: Scalar,
    opts: &TgOptions,
) -> Result<()> {
    let settings = IndexSettings::from(opts);
    let flags = scalar.flags();
    match scalar {
        Scalar::Version => conn.create_scalar_function(name, n_arg, flags, |_| Ok(version()))?,
        Scalar::Debug => {
            let text = debug_text(opts);
            conn.create_scalar_function(name, n_arg, flags, move |_| Ok(text.clone()))?
        }
        Scalar::Type => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = geom_arg(ctx, 0, &settings)?;
            Ok(geom.geom_type().name())
        })?,
        Scalar::Geom => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = geom_arg(ctx, 0, &settings)?;
            Ok(to_tagged(&geom))
        })?,
        Scalar::GeomIndexed => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            geom_with_index(ctx, &settings).map_err(fail)
        })?,
        Scalar::Point => conn.create_scalar_function(name, n_arg, flags, |ctx| {
            let geom = point(ctx).map_err(fail)?;
            Ok(to_tagged(&geom))
        })?,
        Scalar::PointAs(format) => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = point(ctx).map_err(fail)?;
            Ok(encoded(codec::encode(&geom, format)))
        })?,
        Scalar::MultiPoint => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let args = (0..ctx.len()).map(|i| geom_arg_uncached(ctx, i, &settings));
            let geom = build::multipoint(args).map_err(fail)?;
            Ok(to_tagged(&geom))
        })?,
        Scalar::Line => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let args = (0..ctx.len()).map(|i| geom_arg_uncached(ctx, i, &settings));
            let geom = build::line(args).map_err(fail)?;
            Ok(to_tagged(&geom))
        })?,
        Scalar::PolyExterior => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = geom_arg(ctx, 0, &settings)?;
            let ring = build::poly_exterior(&geom).map_err(fail)?;
            Ok(to_tagged(&ring))
        })?,
        Scalar::To(Format::GeoJson) => {
            conn.create_scalar_function(name, n_arg, flags, move |ctx| {
                let geom = geom_arg(ctx, 0, &settings)?;
                Ok(json(geojson::write(&geom)))
            })?
        }
        Scalar::To(format) => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = geom_arg(ctx, 0, &settings)?;
            Ok(encoded(codec::encode(&geom, format)))
        })?,
        Scalar::Valid(format) => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            Ok(is_valid(ctx.get_raw(0), format, &settings))
        })?,
        Scalar::ExtraJson => conn.create_scalar_function(name, n_arg, flags, move |ctx| {
            let geom = geom_arg(ctx, 0, &settings)?;
            Ok(match geom.extra_json() {
                Some(extra) => (Some(extra.to_owned()), Some(JSON_SUBTYPE)),
                None => (None, None),
            })
        })?,
        Scalar::Predicate(predicate) => {
            conn.create_scalar_function(name, n_arg, flags, move |ctx| {
                let a = geom_arg(ctx, 0, &settings)?;
                let b = geom_arg(ctx, 1, &settings)?;
                Ok(predicate.evaluate(&a, &b))
            })?
        }
    }
    Ok(())
}

fn point(ctx: &Context<'_>) -> Result<Geom> {
    let x = number_arg(ctx, 0, "X")?;
    let y = number_arg(ctx, 1, "Y")?;
    build::point(x, y)
}

fn geom_with_index(ctx: &Context<'_>, settings: &IndexSettings) -> Result<Vec<u8>> {
    let kind = match ctx.get_raw(1) {
        ValueRef::Text(bytes) => IndexKind::parse(&String::from_utf8_lossy(bytes))?,
        _ => {
            return Err(TgError::Type(
                "index option must be text, one of none/natural/ystripes".into(),
            ))
        }
    };
    let geom = geom_arg_uncached(ctx, 0, &settings.with_kind(kind))?;
    Ok(to_tagged(&geom))
}

/// SQL value of an encoded geometry.
#[derive(Debug)]
enum Out {
    Text(String),
    Blob(Vec<u8>),
}

impl rusqlite::ToSql for Out {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            Out::Text(text) => text.to_sql(),
            Out::Blob(bytes) => bytes.to_sql(),
        }
    }
}

fn encoded(value: Encoded) -> Out {
    match value {
        Encoded::Text(text) => Out::Text(text),
        Encoded::Binary(bytes) => Out::Blob(bytes),
    }
}

fn is_valid(value: ValueRef<'_>, format: Format, settings: &IndexSettings) -> bool {
    match (format, value) {
        (Format::Wkt, ValueRef::Text(bytes)) => {
            std::str::from_utf8(bytes).is_ok_and(codec::valid_wkt)
        }
        (Format::GeoJson, ValueRef::Text(bytes)) => {
            std::str::from_utf8(bytes).is_ok_and(codec::valid_geojson)
        }
        (Format::Wkb, ValueRef::Blob(bytes)) if is_tagged(bytes) => {
            from_tagged(bytes, settings).is_ok()
        }
        (Format::Wkb, ValueRef::Blob(bytes)) => codec::valid_wkb(bytes),
        _ => false,
    }
}
