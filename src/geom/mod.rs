//! In-memory geometry model shared by the codecs, predicates, and SQL adapter.
//!
//! A [`Geometry`] is a closed sum over the seven simple-feature types. A [`Geom`]
//! wraps one together with its cached bounding box and any non-standard JSON
//! members carried over from GeoJSON input.

pub mod build;
pub mod index;

use std::fmt;

use smallvec::SmallVec;

pub use self::index::{IndexSettings, RingIndex};
use crate::config::IndexKind;

/// A 2D coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coord {
    /// Horizontal ordinate.
    pub x: f64,
    /// Vertical ordinate.
    pub y: f64,
}

impl Coord {
    /// Creates a coordinate.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Lower-left corner.
    pub min: Coord,
    /// Upper-right corner.
    pub max: Coord,
}

impl Rect {
    /// Degenerate rectangle covering a single coordinate.
    pub fn from_coord(c: Coord) -> Self {
        Self { min: c, max: c }
    }

    /// Bounding rectangle of a segment.
    pub fn of_segment(a: Coord, b: Coord) -> Self {
        Self {
            min: Coord::new(a.x.min(b.x), a.y.min(b.y)),
            max: Coord::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Bounding rectangle of a coordinate sequence, `None` when it is empty.
    pub fn of_coords<'a, I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coord>,
    {
        let mut iter = coords.into_iter();
        let first = *iter.next()?;
        let mut rect = Rect::from_coord(first);
        for c in iter {
            rect.expand_coord(*c);
        }
        Some(rect)
    }

    /// Grows the rectangle to include `c`.
    pub fn expand_coord(&mut self, c: Coord) {
        self.min.x = self.min.x.min(c.x);
        self.min.y = self.min.y.min(c.y);
        self.max.x = self.max.x.max(c.x);
        self.max.y = self.max.y.max(c.y);
    }

    /// Smallest rectangle containing both.
    pub fn union(self, other: Rect) -> Rect {
        let mut out = self;
        out.expand_coord(other.min);
        out.expand_coord(other.max);
        out
    }

    /// Whether the rectangles share at least one point, edges included.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether `other` lies entirely within this rectangle, edges included.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
    }

    /// Whether `c` lies within this rectangle, edges included.
    pub fn contains_coord(&self, c: Coord) -> bool {
        c.x >= self.min.x && c.x <= self.max.x && c.y >= self.min.y && c.y <= self.max.y
    }

    /// Closed ring tracing the rectangle counter-clockwise from the lower-left corner.
    pub fn to_ring_points(&self) -> Vec<Coord> {
        vec![
            self.min,
            Coord::new(self.max.x, self.min.y),
            self.max,
            Coord::new(self.min.x, self.max.y),
            self.min,
        ]
    }
}

/// Geometry type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeomType {
    /// Single position.
    Point,
    /// Connected sequence of segments.
    LineString,
    /// Area bounded by an exterior ring with optional holes.
    Polygon,
    /// Collection of points.
    MultiPoint,
    /// Collection of linestrings.
    MultiLineString,
    /// Collection of polygons.
    MultiPolygon,
    /// Heterogeneous collection.
    GeometryCollection,
}

impl GeomType {
    /// Name used by `tg_type()` and GeoJSON.
    pub fn name(self) -> &'static str {
        match self {
            GeomType::Point => "Point",
            GeomType::LineString => "LineString",
            GeomType::Polygon => "Polygon",
            GeomType::MultiPoint => "MultiPoint",
            GeomType::MultiLineString => "MultiLineString",
            GeomType::MultiPolygon => "MultiPolygon",
            GeomType::GeometryCollection => "GeometryCollection",
        }
    }

    /// Uppercase WKT keyword.
    pub fn wkt_keyword(self) -> &'static str {
        match self {
            GeomType::Point => "POINT",
            GeomType::LineString => "LINESTRING",
            GeomType::Polygon => "POLYGON",
            GeomType::MultiPoint => "MULTIPOINT",
            GeomType::MultiLineString => "MULTILINESTRING",
            GeomType::MultiPolygon => "MULTIPOLYGON",
            GeomType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// Standard 2D WKB type code.
    pub fn wkb_code(self) -> u32 {
        match self {
            GeomType::Point => 1,
            GeomType::LineString => 2,
            GeomType::Polygon => 3,
            GeomType::MultiPoint => 4,
            GeomType::MultiLineString => 5,
            GeomType::MultiPolygon => 6,
            GeomType::GeometryCollection => 7,
        }
    }

    /// Inverse of [`GeomType::wkb_code`].
    pub fn from_wkb_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            4 => GeomType::MultiPoint,
            5 => GeomType::MultiLineString,
            6 => GeomType::MultiPolygon,
            7 => GeomType::GeometryCollection,
            _ => return None,
        })
    }

    /// Looks a type up by its WKT keyword, ignoring case.
    pub fn from_wkt_keyword(word: &str) -> Option<Self> {
        [
            GeomType::Point,
            GeomType::LineString,
            GeomType::Polygon,
            GeomType::MultiPoint,
            GeomType::MultiLineString,
            GeomType::MultiPolygon,
            GeomType::GeometryCollection,
        ]
        .into_iter()
        .find(|t| t.wkt_keyword().eq_ignore_ascii_case(word))
    }

    /// Looks a type up by its GeoJSON name.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            GeomType::Point,
            GeomType::LineString,
            GeomType::Polygon,
            GeomType::MultiPoint,
            GeomType::MultiLineString,
            GeomType::MultiPolygon,
            GeomType::GeometryCollection,
        ]
        .into_iter()
        .find(|t| t.name() == name)
    }
}

impl fmt::Display for GeomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Open sequence of positions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Line {
    points: Vec<Coord>,
}

impl Line {
    /// Wraps a coordinate sequence.
    pub fn new(points: Vec<Coord>) -> Self {
        Self { points }
    }

    /// Positions in order.
    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    /// Whether the line holds no positions.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Segment `i` as its two end positions.
    pub fn segment(&self, i: usize) -> (Coord, Coord) {
        (self.points[i], self.points[i + 1])
    }

    /// Whether the first and last positions coincide.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => self.points.len() > 1 && a == b,
            _ => false,
        }
    }

    /// Bounding rectangle.
    pub fn rect(&self) -> Option<Rect> {
        Rect::of_coords(&self.points)
    }
}

/// Closed ring of positions; the closing position is always stored.
#[derive(Clone, Debug, Default)]
pub struct Ring {
    points: Vec<Coord>,
    rect: Option<Rect>,
    index: Option<RingIndex>,
}

impl PartialEq for Ring {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

impl Ring {
    /// Builds a ring, appending the first position when the input is not closed.
    pub fn new(mut points: Vec<Coord>) -> Self {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first != last {
                points.push(first);
            }
        }
        let rect = Rect::of_coords(&points);
        Self {
            points,
            rect,
            index: None,
        }
    }

    /// Positions including the closing one.
    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    /// Whether the ring holds no positions.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Segment `i` as its two end positions.
    pub fn segment(&self, i: usize) -> (Coord, Coord) {
        (self.points[i], self.points[i + 1])
    }

    /// Cached bounding rectangle.
    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Segment index, if one was built.
    pub fn index(&self) -> Option<&RingIndex> {
        self.index.as_ref()
    }

    /// Builds or drops the segment index according to `settings`.
    pub fn build_index(&mut self, settings: &IndexSettings) {
        self.index = RingIndex::build(self, settings);
    }

    /// Calls `f` with every segment whose bounding box may intersect `query`.
    /// Iteration stops early when `f` returns `false`.
    pub fn search_segments<F>(&self, query: &Rect, mut f: F)
    where
        F: FnMut(usize, Coord, Coord) -> bool,
    {
        match &self.index {
            Some(index) => index.search(self, query, &mut f),
            None => {
                for i in 0..self.num_segments() {
                    let (a, b) = self.segment(i);
                    if Rect::of_segment(a, b).intersects(query) && !f(i, a, b) {
                        return;
                    }
                }
            }
        }
    }

    /// Signed area, positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.num_segments() {
            let (a, b) = self.segment(i);
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    /// Ring viewed as a closed line.
    pub fn to_line(&self) -> Line {
        Line::new(self.points.clone())
    }
}

/// Polygon with an exterior ring and zero or more holes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    exterior: Ring,
    holes: Vec<Ring>,
}

impl Polygon {
    /// Assembles a polygon from its rings.
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    /// Exterior ring.
    pub fn exterior(&self) -> &Ring {
        &self.exterior
    }

    /// Interior rings.
    pub fn holes(&self) -> &[Ring] {
        &self.holes
    }

    /// Whether the polygon has no exterior ring.
    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    /// Every ring, exterior first.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> + Clone {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }

    /// Bounding rectangle of the exterior ring.
    pub fn rect(&self) -> Option<Rect> {
        self.exterior.rect()
    }

    fn build_indexes(&mut self, settings: &IndexSettings) {
        self.exterior.build_index(settings);
        for hole in &mut self.holes {
            hole.build_index(settings);
        }
    }
}

/// Closed sum over the supported geometry types.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// A position, or `None` for `POINT EMPTY`.
    Point(Option<Coord>),
    /// A linestring.
    LineString(Line),
    /// A polygon.
    Polygon(Polygon),
    /// Points in declaration order.
    MultiPoint(Vec<Coord>),
    /// Linestrings in declaration order.
    MultiLineString(Vec<Line>),
    /// Polygons in declaration order.
    MultiPolygon(Vec<Polygon>),
    /// Arbitrary members in declaration order.
    GeometryCollection(Vec<Geometry>),
}

/// Borrowed singular component of a geometry, used by the predicate engine.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Part<'a> {
    Point(Coord),
    Line(&'a Line),
    Poly(&'a Polygon),
}

impl Part<'_> {
    pub(crate) fn rect(&self) -> Option<Rect> {
        match self {
            Part::Point(c) => Some(Rect::from_coord(*c)),
            Part::Line(l) => l.rect(),
            Part::Poly(p) => p.rect(),
        }
    }
}

pub(crate) type Parts<'a> = SmallVec<[Part<'a>; 4]>;

impl Geometry {
    /// Type tag matching the stored shape.
    pub fn geom_type(&self) -> GeomType {
        match self {
            Geometry::Point(_) => GeomType::Point,
            Geometry::LineString(_) => GeomType::LineString,
            Geometry::Polygon(_) => GeomType::Polygon,
            Geometry::MultiPoint(_) => GeomType::MultiPoint,
            Geometry::MultiLineString(_) => GeomType::MultiLineString,
            Geometry::MultiPolygon(_) => GeomType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeomType::GeometryCollection,
        }
    }

    /// Whether the geometry holds no positions at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(p) => p.is_none(),
            Geometry::LineString(l) => l.is_empty(),
            Geometry::Polygon(p) => p.is_empty(),
            Geometry::MultiPoint(pts) => pts.is_empty(),
            Geometry::MultiLineString(lines) => lines.iter().all(Line::is_empty),
            Geometry::MultiPolygon(polys) => polys.iter().all(Polygon::is_empty),
            Geometry::GeometryCollection(geoms) => geoms.iter().all(Geometry::is_empty),
        }
    }

    /// Bounding rectangle, `None` for empty geometries.
    pub fn rect(&self) -> Option<Rect> {
        fn fold(acc: Option<Rect>, next: Option<Rect>) -> Option<Rect> {
            match (acc, next) {
                (Some(a), Some(b)) => Some(a.union(b)),
                (a, b) => a.or(b),
            }
        }
        match self {
            Geometry::Point(p) => p.map(Rect::from_coord),
            Geometry::LineString(l) => l.rect(),
            Geometry::Polygon(p) => p.rect(),
            Geometry::MultiPoint(pts) => Rect::of_coords(pts),
            Geometry::MultiLineString(lines) => lines.iter().map(Line::rect).fold(None, fold),
            Geometry::MultiPolygon(polys) => polys.iter().map(Polygon::rect).fold(None, fold),
            Geometry::GeometryCollection(geoms) => {
                geoms.iter().map(Geometry::rect).fold(None, fold)
            }
        }
    }

    /// Number of direct members for multi-types and collections, 1 otherwise.
    pub fn num_members(&self) -> usize {
        match self {
            Geometry::MultiPoint(pts) => pts.len(),
            Geometry::MultiLineString(lines) => lines.len(),
            Geometry::MultiPolygon(polys) => polys.len(),
            Geometry::GeometryCollection(geoms) => geoms.len(),
            _ => 1,
        }
    }

    /// Direct member `i` of a multi-type or collection as a standalone geometry.
    pub fn member(&self, i: usize) -> Option<Geometry> {
        match self {
            Geometry::MultiPoint(pts) => pts.get(i).map(|c| Geometry::Point(Some(*c))),
            Geometry::MultiLineString(lines) => lines.get(i).cloned().map(Geometry::LineString),
            Geometry::MultiPolygon(polys) => polys.get(i).cloned().map(Geometry::Polygon),
            Geometry::GeometryCollection(geoms) => geoms.get(i).cloned(),
            single if i == 0 => Some(single.clone()),
            _ => None,
        }
    }

    /// Flattens the geometry into non-empty singular parts.
    pub(crate) fn parts(&self) -> Parts<'_> {
        let mut out = Parts::new();
        self.collect_parts(&mut out);
        out
    }

    fn collect_parts<'a>(&'a self, out: &mut Parts<'a>) {
        match self {
            Geometry::Point(Some(c)) => out.push(Part::Point(*c)),
            Geometry::Point(None) => {}
            Geometry::LineString(l) if !l.is_empty() => out.push(Part::Line(l)),
            Geometry::LineString(_) => {}
            Geometry::Polygon(p) if !p.is_empty() => out.push(Part::Poly(p)),
            Geometry::Polygon(_) => {}
            Geometry::MultiPoint(pts) => out.extend(pts.iter().map(|c| Part::Point(*c))),
            Geometry::MultiLineString(lines) => out.extend(
                lines
                    .iter()
                    .filter(|l| !l.is_empty())
                    .map(Part::Line),
            ),
            Geometry::MultiPolygon(polys) => out.extend(
                polys
                    .iter()
                    .filter(|p| !p.is_empty())
                    .map(Part::Poly),
            ),
            Geometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.collect_parts(out);
                }
            }
        }
    }

    /// Builds or drops ring indexes on every polygon.
    pub fn build_indexes(&mut self, settings: &IndexSettings) {
        match self {
            Geometry::Polygon(p) => p.build_indexes(settings),
            Geometry::MultiPolygon(polys) => {
                for p in polys {
                    p.build_indexes(settings);
                }
            }
            Geometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.build_indexes(settings);
                }
            }
            _ => {}
        }
    }
}

/// Geometry value with its bounding box and preserved GeoJSON members.
#[derive(Clone, Debug, PartialEq)]
pub struct Geom {
    shape: Geometry,
    rect: Option<Rect>,
    extra_json: Option<String>,
    feature: bool,
    index: IndexKind,
}

impl Geom {
    /// Wraps a shape, computing its bounding box.
    pub fn new(shape: Geometry) -> Self {
        let rect = shape.rect();
        Self {
            shape,
            rect,
            extra_json: None,
            feature: false,
            index: IndexKind::None,
        }
    }

    /// Attaches the non-standard members of the GeoJSON object this shape came from.
    pub fn with_extra_json(mut self, extra: Option<String>) -> Self {
        self.extra_json = extra;
        self
    }

    /// Marks the value as having been read from a GeoJSON `Feature`.
    pub fn with_feature(mut self, feature: bool) -> Self {
        self.feature = feature;
        self
    }

    /// Builds ring indexes with the given settings.
    pub fn indexed(mut self, settings: &IndexSettings) -> Self {
        self.shape.build_indexes(settings);
        self.index = settings.kind;
        self
    }

    /// The shape.
    pub fn shape(&self) -> &Geometry {
        &self.shape
    }

    /// Consumes the value, returning the shape.
    pub fn into_shape(self) -> Geometry {
        self.shape
    }

    /// Type tag of the shape.
    pub fn geom_type(&self) -> GeomType {
        self.shape.geom_type()
    }

    /// Cached bounding box, `None` for empty geometries.
    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Preserved non-standard GeoJSON members as a JSON object text.
    pub fn extra_json(&self) -> Option<&str> {
        self.extra_json.as_deref()
    }

    /// Whether the value was read from a GeoJSON `Feature`.
    pub fn is_feature(&self) -> bool {
        self.feature
    }

    /// Ring index kind the value was built with.
    pub fn index_kind(&self) -> IndexKind {
        self.index
    }

    /// Whether the shape holds no positions.
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }
}

impl From<Geometry> for Geom {
    fn from(shape: Geometry) -> Self {
        Geom::new(shape)
    }
}
