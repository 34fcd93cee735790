//! GeoJSON geometries, features, and feature collections.
//!
//! Members the geometry model does not understand are kept verbatim as the
//! value's extra JSON so they survive a parse and write cycle.

use serde_json::{Map, Value};

use super::{line_from, ring_from, write_num};
use crate::error::{Result, TgError};
use crate::geom::{Coord, Geom, GeomType, Geometry, Line, Polygon, Ring};

const MAX_DEPTH: usize = 64;

/// Parses a GeoJSON geometry, `Feature`, or `FeatureCollection`.
pub fn parse(text: &str) -> Result<Geom> {
    let value: Value = serde_json::from_str(text).map_err(|e| invalid(&e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object"))?;
    match type_of(obj)? {
        "Feature" => {
            let shape = feature_geometry(obj)?;
            Ok(Geom::new(shape)
                .with_extra_json(extras(obj, &["type", "geometry"])?)
                .with_feature(true))
        }
        "FeatureCollection" => {
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("'features' must be an array"))?;
            let mut members = Vec::with_capacity(features.len());
            for feature in features {
                let feature = feature
                    .as_object()
                    .ok_or_else(|| invalid("features must be objects"))?;
                if type_of(feature)? != "Feature" {
                    return Err(invalid("FeatureCollection members must be Features"));
                }
                members.push(feature_geometry(feature)?);
            }
            Ok(Geom::new(Geometry::GeometryCollection(members))
                .with_extra_json(extras(obj, &["type", "features"])?))
        }
        _ => {
            let shape = geometry(obj, 0)?;
            Ok(Geom::new(shape).with_extra_json(extras(
                obj,
                &["type", "coordinates", "geometries"],
            )?))
        }
    }
}

/// Renders a value as compact GeoJSON.
///
/// Values read from a `Feature` come back as a `Feature`; other values with
/// extra members carry them after `coordinates` or `geometries`.
pub fn write(geom: &Geom) -> String {
    let mut out = String::with_capacity(64);
    if geom.is_feature() {
        out.push_str("{\"type\":\"Feature\",\"geometry\":");
        write_geometry(&mut out, geom.shape());
        match geom.extra_json().and_then(extra_members) {
            Some(members) => {
                out.push(',');
                out.push_str(members);
            }
            None => out.push_str(",\"properties\":null"),
        }
        out.push('}');
        return out;
    }
    write_geometry(&mut out, geom.shape());
    if let Some(members) = geom.extra_json().and_then(extra_members) {
        out.pop();
        out.push(',');
        out.push_str(members);
        out.push('}');
    }
    out
}

/// Accumulates rows into a `FeatureCollection` document.
#[derive(Debug, Default)]
pub struct FeatureCollectionWriter {
    out: String,
    count: usize,
}

impl FeatureCollectionWriter {
    /// Appends one feature. A value that already carries extra members is
    /// written as-is; any other value is wrapped with `properties`, which
    /// defaults to `{}`.
    pub fn push(&mut self, geom: &Geom, properties: Option<&str>) {
        if self.count == 0 {
            self.out.push_str("{\"type\":\"FeatureCollection\",\"features\":[");
        } else {
            self.out.push(',');
        }
        self.count += 1;
        if geom.extra_json().is_some() {
            self.out.push_str(&write(geom));
            return;
        }
        self.out.push_str("{\"type\":\"Feature\",\"geometry\":");
        write_geometry(&mut self.out, geom.shape());
        self.out.push_str(",\"properties\":");
        self.out.push_str(properties.unwrap_or("{}"));
        self.out.push('}');
    }

    /// Number of features written so far.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no feature was written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The finished document, `None` when no rows were pushed.
    pub fn finish(mut self) -> Option<String> {
        if self.count == 0 {
            return None;
        }
        self.out.push_str("]}");
        Some(self.out)
    }
}

fn invalid(what: &str) -> TgError {
    TgError::parse(format!("invalid geojson: {what}"))
}

fn type_of(obj: &Map<String, Value>) -> Result<&str> {
    obj.get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing 'type' member"))
}

/// Members other than `skip`, as compact JSON object text.
fn extras(obj: &Map<String, Value>, skip: &[&str]) -> Result<Option<String>> {
    let rest: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if rest.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&rest)?))
}

/// Object text without its braces, `None` for `{}`.
fn extra_members(json: &str) -> Option<&str> {
    let inner = json.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    (!inner.is_empty()).then_some(inner)
}

fn feature_geometry(obj: &Map<String, Value>) -> Result<Geometry> {
    match obj.get("geometry") {
        Some(Value::Object(g)) => geometry(g, 0),
        Some(Value::Null) => Ok(Geometry::GeometryCollection(Vec::new())),
        _ => Err(invalid("Feature requires a 'geometry' member")),
    }
}

fn geometry(obj: &Map<String, Value>, depth: usize) -> Result<Geometry> {
    if depth > MAX_DEPTH {
        return Err(invalid("collections nested too deeply"));
    }
    let name = type_of(obj)?;
    let kind =
        GeomType::from_name(name).ok_or_else(|| invalid(&format!("unknown type '{name}'")))?;
    let coords = || {
        obj.get("coordinates")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("'coordinates' must be an array"))
    };
    Ok(match kind {
        GeomType::Point => {
            let c = coords()?;
            if c.is_empty() {
                Geometry::Point(None)
            } else {
                Geometry::Point(Some(position(c)?))
            }
        }
        GeomType::LineString => Geometry::LineString(line(coords()?)?),
        GeomType::Polygon => Geometry::Polygon(polygon(coords()?)?),
        GeomType::MultiPoint => Geometry::MultiPoint(
            coords()?
                .iter()
                .map(|v| position(as_array(v)?))
                .collect::<Result<_>>()?,
        ),
        GeomType::MultiLineString => Geometry::MultiLineString(
            coords()?
                .iter()
                .map(|v| line(as_array(v)?))
                .collect::<Result<_>>()?,
        ),
        GeomType::MultiPolygon => Geometry::MultiPolygon(
            coords()?
                .iter()
                .map(|v| polygon(as_array(v)?))
                .collect::<Result<_>>()?,
        ),
        GeomType::GeometryCollection => {
            let members = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("'geometries' must be an array"))?;
            let mut out = Vec::with_capacity(members.len());
            for member in members {
                let member = member
                    .as_object()
                    .ok_or_else(|| invalid("geometries must be objects"))?;
                out.push(geometry(member, depth + 1)?);
            }
            Geometry::GeometryCollection(out)
        }
    })
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| invalid("expected an array of positions"))
}

fn position(values: &[Value]) -> Result<Coord> {
    if values.len() < 2 {
        return Err(invalid("positions need at least two numbers"));
    }
    let mut xy = [0.0; 2];
    for (slot, v) in xy.iter_mut().zip(values) {
        *slot = v
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid("position members must be finite numbers"))?;
    }
    Ok(Coord::new(xy[0], xy[1]))
}

fn positions(values: &[Value]) -> Result<Vec<Coord>> {
    values.iter().map(|v| position(as_array(v)?)).collect()
}

fn line(values: &[Value]) -> Result<Line> {
    line_from(positions(values)?).map_err(invalid)
}

fn ring(values: &[Value]) -> Result<Ring> {
    ring_from(positions(values)?).map_err(invalid)
}

fn polygon(values: &[Value]) -> Result<Polygon> {
    let mut rings = Vec::with_capacity(values.len());
    for v in values {
        rings.push(ring(as_array(v)?)?);
    }
    let mut iter = rings.into_iter();
    Ok(match iter.next() {
        Some(exterior) => Polygon::new(exterior, iter.collect()),
        None => Polygon::default(),
    })
}

fn write_position(out: &mut String, c: Coord) {
    out.push('[');
    write_num(out, c.x);
    out.push(',');
    write_num(out, c.y);
    out.push(']');
}

fn write_positions(out: &mut String, pts: &[Coord]) {
    out.push('[');
    for (i, c) in pts.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_position(out, *c);
    }
    out.push(']');
}

fn write_rings(out: &mut String, poly: &Polygon) {
    out.push('[');
    if !poly.is_empty() {
        for (i, ring) in poly.rings().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_positions(out, ring.points());
        }
    }
    out.push(']');
}

fn write_list<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        each(out, item);
    }
    out.push(']');
}

fn write_geometry(out: &mut String, shape: &Geometry) {
    out.push_str("{\"type\":\"");
    out.push_str(shape.geom_type().name());
    if let Geometry::GeometryCollection(geoms) = shape {
        out.push_str("\",\"geometries\":");
        write_list(out, geoms, write_geometry);
        out.push('}');
        return;
    }
    out.push_str("\",\"coordinates\":");
    match shape {
        Geometry::Point(Some(c)) => write_position(out, *c),
        Geometry::Point(None) => out.push_str("[]"),
        Geometry::LineString(l) => write_positions(out, l.points()),
        Geometry::Polygon(p) => write_rings(out, p),
        Geometry::MultiPoint(pts) => write_positions(out, pts),
        Geometry::MultiLineString(lines) => {
            write_list(out, lines, |out, l| write_positions(out, l.points()))
        }
        Geometry::MultiPolygon(polys) => write_list(out, polys, write_rings),
        Geometry::GeometryCollection(_) => {}
    }
    out.push('}');
}
