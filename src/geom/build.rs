//! Constructors and accumulators that assemble geometries from other geometries.

use super::{Coord, Geom, Geometry, Line, Polygon, Rect, Ring};
use crate::error::{Result, TgError};

/// Builds a point, rejecting non-finite ordinates.
pub fn point(x: f64, y: f64) -> Result<Geom> {
    if !x.is_finite() {
        return Err(TgError::Type("point X value must be a finite number".into()));
    }
    if !y.is_finite() {
        return Err(TgError::Type("point Y value must be a finite number".into()));
    }
    Ok(Geom::new(Geometry::Point(Some(Coord::new(x, y)))))
}

/// Collects the coordinates of point arguments given to the variadic
/// constructor `function`, reporting the 0-based index of the first bad one.
pub fn points_from_args<I>(function: &str, args: I) -> Result<Vec<Coord>>
where
    I: IntoIterator<Item = Result<Geom>>,
{
    let mut out = Vec::new();
    for (i, arg) in args.into_iter().enumerate() {
        let geom = arg.map_err(|err| {
            TgError::value(format!(
                "argument to {function}() at index {i} is an invalid geometry: {err}"
            ))
        })?;
        match geom.shape() {
            Geometry::Point(Some(c)) => out.push(*c),
            Geometry::Point(None) => {
                return Err(TgError::value(format!(
                    "argument to {function}() at index {i} expected a point, found an empty Point"
                )))
            }
            other => {
                return Err(TgError::value(format!(
                    "argument to {function}() at index {i} expected a point, found {}",
                    other.geom_type()
                )))
            }
        }
    }
    Ok(out)
}

/// `tg_multipoint(p0, .., pn)`; no arguments yields `MULTIPOINT EMPTY`.
pub fn multipoint<I>(args: I) -> Result<Geom>
where
    I: IntoIterator<Item = Result<Geom>>,
{
    let points = points_from_args("tg_multipoint", args)?;
    Ok(Geom::new(Geometry::MultiPoint(points)))
}

/// `tg_line(p0, .., pn)`; no arguments yields `LINESTRING EMPTY`.
pub fn line<I>(args: I) -> Result<Geom>
where
    I: IntoIterator<Item = Result<Geom>>,
{
    let points = points_from_args("tg_line", args)?;
    if points.len() == 1 {
        return Err(TgError::value(
            "tg_line() requires zero or at least two points",
        ));
    }
    Ok(Geom::new(Geometry::LineString(Line::new(points))))
}

/// Exterior ring of a polygon as a linestring.
pub fn poly_exterior(geom: &Geom) -> Result<Geom> {
    match geom.shape() {
        Geometry::Polygon(poly) => Ok(Geom::new(Geometry::LineString(
            poly.exterior().to_line(),
        ))),
        _ => Err(TgError::value("argument to tg_poly_exterior() is not a polygon")),
    }
}

/// Polygon tracing a rectangle.
pub fn rect_polygon(rect: &Rect) -> Geom {
    Geom::new(Geometry::Polygon(Polygon::new(
        Ring::new(rect.to_ring_points()),
        Vec::new(),
    )))
}

/// Accumulates Point rows into a MultiPoint.
#[derive(Debug, Default)]
pub struct MultiPointBuilder {
    points: Vec<Coord>,
}

impl MultiPointBuilder {
    /// Appends one point.
    pub fn push(&mut self, geom: &Geom) -> Result<()> {
        match geom.shape() {
            Geometry::Point(Some(c)) => {
                self.points.push(*c);
                Ok(())
            }
            _ => Err(TgError::value(
                "parameters to tg_group_multipoint() must be Point geometries",
            )),
        }
    }

    /// The collected points; empty when nothing was pushed.
    pub fn finish(self) -> Geom {
        Geom::new(Geometry::MultiPoint(self.points))
    }
}

/// Accumulates Polygon rows into a MultiPolygon.
#[derive(Debug, Default)]
pub struct MultiPolygonBuilder {
    polys: Vec<Polygon>,
}

impl MultiPolygonBuilder {
    /// Appends one polygon.
    pub fn push(&mut self, geom: &Geom) -> Result<()> {
        match geom.shape() {
            Geometry::Polygon(p) => {
                self.polys.push(p.clone());
                Ok(())
            }
            _ => Err(TgError::value(
                "inputs to tg_group_multipolygon() must be Polygon geometries",
            )),
        }
    }

    /// The collected polygons.
    pub fn finish(self) -> Geom {
        Geom::new(Geometry::MultiPolygon(self.polys))
    }
}

/// Accumulates rows into a GeometryCollection.
#[derive(Debug, Default)]
pub struct CollectionBuilder {
    members: Vec<Geometry>,
}

impl CollectionBuilder {
    /// Appends one geometry.
    pub fn push(&mut self, geom: Geom) {
        self.members.push(geom.into_shape());
    }

    /// The collected members.
    pub fn finish(self) -> Geom {
        Geom::new(Geometry::GeometryCollection(self.members))
    }
}

/// Accumulates the union of bounding boxes.
#[derive(Debug, Default)]
pub struct BboxBuilder {
    rect: Option<Rect>,
}

impl BboxBuilder {
    /// Expands the box by one geometry; empty geometries are ignored.
    pub fn push(&mut self, geom: &Geom) {
        if let Some(r) = geom.rect() {
            self.rect = Some(match self.rect {
                Some(acc) => acc.union(r),
                None => r,
            });
        }
    }

    /// The box as a polygon, `None` when no non-empty geometry was seen.
    pub fn finish(self) -> Option<Geom> {
        self.rect.as_ref().map(rect_polygon)
    }
}
