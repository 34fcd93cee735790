//! Member cursors behind the `*_each` table functions.
//!
//! A [`MemberCursor`] holds the source geometry and a position. It is forward
//! only; calling [`MemberCursor::reset`] starts a fresh pass over a new source.

use crate::geom::{Geometry, Polygon, Rect};

/// Which members a cursor produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decompose {
    /// Points of a MultiPoint, or a Point itself.
    Points,
    /// LineStrings of a MultiLineString, or a LineString itself.
    Lines,
    /// Polygons of a MultiPolygon, or a Polygon itself.
    Polygons,
    /// Interior rings of a Polygon, each as a Polygon.
    Holes,
    /// Direct members of a multi-type or collection, or a singular geometry itself.
    Geometries,
}

impl Decompose {
    /// Every kind with its table function names.
    pub const FUNCTIONS: [(&'static str, Decompose); 6] = [
        ("tg_points_each", Decompose::Points),
        ("tg_lines_each", Decompose::Lines),
        ("tg_polygons_each", Decompose::Polygons),
        ("tg_holes_each", Decompose::Holes),
        ("tg_geometries_each", Decompose::Geometries),
        ("tg_each", Decompose::Geometries),
    ];

    /// Name of the member column.
    pub fn column(self) -> &'static str {
        match self {
            Decompose::Points => "point",
            Decompose::Lines => "line",
            Decompose::Polygons => "polygon",
            Decompose::Holes => "hole",
            Decompose::Geometries => "geometry",
        }
    }

    fn count(self, shape: &Geometry) -> usize {
        match (self, shape) {
            (Decompose::Points, Geometry::MultiPoint(pts)) => pts.len(),
            (Decompose::Points, Geometry::Point(Some(_))) => 1,
            (Decompose::Lines, Geometry::MultiLineString(lines)) => lines.len(),
            (Decompose::Lines, Geometry::LineString(l)) => usize::from(!l.is_empty()),
            (Decompose::Polygons, Geometry::MultiPolygon(polys)) => polys.len(),
            (Decompose::Polygons, Geometry::Polygon(p)) => usize::from(!p.is_empty()),
            (Decompose::Holes, Geometry::Polygon(p)) => p.holes().len(),
            (
                Decompose::Geometries,
                Geometry::MultiPoint(_)
                | Geometry::MultiLineString(_)
                | Geometry::MultiPolygon(_)
                | Geometry::GeometryCollection(_),
            ) => shape.num_members(),
            (Decompose::Geometries, single) => usize::from(!single.is_empty()),
            _ => 0,
        }
    }

    fn nth(self, shape: &Geometry, i: usize) -> Option<Geometry> {
        match (self, shape) {
            (Decompose::Holes, Geometry::Polygon(p)) => p
                .holes()
                .get(i)
                .map(|ring| Geometry::Polygon(Polygon::new(ring.clone(), Vec::new()))),
            _ => shape.member(i),
        }
    }
}

/// Forward-only cursor over the members of one source geometry.
#[derive(Clone, Debug)]
pub struct MemberCursor {
    kind: Decompose,
    source: Option<Geometry>,
    len: usize,
    pos: usize,
}

impl MemberCursor {
    /// Cursor with no source; it is at its end until [`reset`](Self::reset).
    pub fn new(kind: Decompose) -> Self {
        Self {
            kind,
            source: None,
            len: 0,
            pos: 0,
        }
    }

    /// Starts over with a new source; `None` yields no rows.
    pub fn reset(&mut self, source: Option<Geometry>) {
        self.len = source.as_ref().map_or(0, |s| self.kind.count(s));
        self.source = source;
        self.pos = 0;
    }

    /// Whether every member has been visited.
    pub fn eof(&self) -> bool {
        self.pos >= self.len
    }

    /// Moves to the next member.
    pub fn advance(&mut self) {
        if !self.eof() {
            self.pos += 1;
        }
    }

    /// Zero-based index of the current member.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The current member, `None` at the end.
    pub fn current(&self) -> Option<Geometry> {
        if self.eof() {
            return None;
        }
        self.kind.nth(self.source.as_ref()?, self.pos)
    }
}

impl Iterator for MemberCursor {
    type Item = Geometry;

    fn next(&mut self) -> Option<Geometry> {
        let item = self.current()?;
        self.advance();
        Some(item)
    }
}

/// Single-row cursor over a bounding box.
#[derive(Clone, Debug, Default)]
pub struct BboxCursor {
    rect: Option<Rect>,
    done: bool,
}

impl BboxCursor {
    /// Starts over with the box of a new source. Empty sources still produce
    /// one row, with every column NULL.
    pub fn reset(&mut self, rect: Option<Rect>, has_source: bool) {
        self.rect = rect;
        self.done = !has_source;
    }

    /// Whether the row has been consumed.
    pub fn eof(&self) -> bool {
        self.done
    }

    /// Consumes the row.
    pub fn advance(&mut self) {
        self.done = true;
    }

    /// `minX, maxX, minY, maxY` in column order.
    pub fn column(&self, i: usize) -> Option<f64> {
        let r = self.rect?;
        match i {
            0 => Some(r.min.x),
            1 => Some(r.max.x),
            2 => Some(r.min.y),
            3 => Some(r.max.y),
            _ => None,
        }
    }
}
