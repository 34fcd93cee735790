//! Exact relations between singular parts.
//!
//! Every test reduces to point location and segment intersection. Segments
//! are cut at every place they meet the other part's boundary, and each piece
//! is classified by its midpoint; pieces lying along the boundary are known to
//! be on it without re-locating them.

use super::segment::{self, Hit};
use crate::geom::{Coord, Line, Part, Polygon, Rect, Ring};

/// Location of a point relative to an areal part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    Inside,
    Boundary,
    Outside,
}

pub(crate) fn locate_in_ring(ring: &Ring, p: Coord) -> Location {
    let ray = Rect {
        min: p,
        max: Coord::new(f64::INFINITY, p.y),
    };
    let mut crossings = 0usize;
    let mut boundary = false;
    ring.search_segments(&ray, |_, a, b| {
        if segment::on_segment(p, a, b) {
            boundary = true;
            return false;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let o = segment::orient(a, b, p);
            if (b.y > a.y && o > 0.0) || (b.y < a.y && o < 0.0) {
                crossings += 1;
            }
        }
        true
    });
    if boundary {
        Location::Boundary
    } else if crossings % 2 == 1 {
        Location::Inside
    } else {
        Location::Outside
    }
}

pub(crate) fn locate_in_polygon(poly: &Polygon, p: Coord) -> Location {
    if !poly.rect().is_some_and(|r| r.contains_coord(p)) {
        return Location::Outside;
    }
    match locate_in_ring(poly.exterior(), p) {
        Location::Inside => {}
        other => return other,
    }
    for hole in poly.holes() {
        match locate_in_ring(hole, p) {
            Location::Inside => return Location::Outside,
            Location::Boundary => return Location::Boundary,
            Location::Outside => {}
        }
    }
    Location::Inside
}

/// A point strictly inside the area enclosed by `rings` under the even-odd
/// rule, found on the horizontal line through the widest vertical gap.
pub(crate) fn interior_point<'a, I>(rings: I) -> Option<Coord>
where
    I: Iterator<Item = &'a Ring> + Clone,
{
    let mut ys: Vec<f64> = rings
        .clone()
        .flat_map(|r| r.points().iter().map(|c| c.y))
        .collect();
    ys.sort_by(f64::total_cmp);
    ys.dedup();
    let gap = ys
        .windows(2)
        .max_by(|a, b| (a[1] - a[0]).total_cmp(&(b[1] - b[0])))?;
    let y = (gap[0] + gap[1]) / 2.0;
    let mut xs = Vec::new();
    for ring in rings {
        for w in ring.points().windows(2) {
            let (a, b) = (w[0], w[1]);
            if (a.y > y) != (b.y > y) {
                xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }
    xs.sort_by(f64::total_cmp);
    let span = xs
        .chunks_exact(2)
        .filter(|s| s[1] > s[0])
        .max_by(|a, b| (a[1] - a[0]).total_cmp(&(b[1] - b[0])))?;
    Some(Coord::new((span[0] + span[1]) / 2.0, y))
}

fn segments(points: &[Coord]) -> impl Iterator<Item = (Coord, Coord)> + '_ {
    points.windows(2).map(|w| (w[0], w[1]))
}

/// Visits polygon boundary segments near `query`; returns `false` if `f` stopped early.
fn each_boundary_segment<F>(poly: &Polygon, query: &Rect, mut f: F) -> bool
where
    F: FnMut(Coord, Coord) -> bool,
{
    for ring in poly.rings() {
        let mut go = true;
        ring.search_segments(query, |_, a, b| {
            go = f(a, b);
            go
        });
        if !go {
            return false;
        }
    }
    true
}

fn point_on_line(p: Coord, line: &Line) -> bool {
    segments(line.points()).any(|(a, b)| segment::on_segment(p, a, b))
}

/// End points of an open line; closed lines have no boundary.
fn line_boundary(line: &Line) -> Option<(Coord, Coord)> {
    let pts = line.points();
    match (pts.first(), pts.last()) {
        (Some(s), Some(e)) if !line.is_closed() => Some((*s, *e)),
        _ => None,
    }
}

fn in_line_boundary(p: Coord, line: &Line) -> bool {
    line_boundary(line).is_some_and(|(s, e)| p == s || p == e)
}

/// Classifies the pieces of `c -> d` cut by the polygon boundary.
fn piece_locations(c: Coord, d: Coord, poly: &Polygon) -> Vec<Location> {
    let mut cuts = vec![0.0, 1.0];
    let mut along: Vec<(f64, f64)> = Vec::new();
    each_boundary_segment(poly, &Rect::of_segment(c, d), |a, b| {
        match segment::intersection(c, d, a, b) {
            Some(Hit::Point(q)) => cuts.push(segment::param(c, d, q).clamp(0.0, 1.0)),
            Some(Hit::Overlap(p, q)) => {
                let tp = segment::param(c, d, p).clamp(0.0, 1.0);
                let tq = segment::param(c, d, q).clamp(0.0, 1.0);
                cuts.push(tp);
                cuts.push(tq);
                along.push((tp.min(tq), tp.max(tq)));
            }
            None => {}
        }
        true
    });
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();
    cuts.windows(2)
        .map(|w| {
            let mid = (w[0] + w[1]) / 2.0;
            if along.iter().any(|(lo, hi)| *lo <= mid && mid <= *hi) {
                Location::Boundary
            } else {
                locate_in_polygon(poly, segment::lerp(c, d, mid))
            }
        })
        .collect()
}

fn poly_covers_path(poly: &Polygon, points: &[Coord]) -> bool {
    !points.is_empty()
        && points
            .iter()
            .all(|p| locate_in_polygon(poly, *p) != Location::Outside)
        && segments(points).all(|(c, d)| {
            piece_locations(c, d, poly)
                .into_iter()
                .all(|loc| loc != Location::Outside)
        })
}

fn path_enters_interior(points: &[Coord], poly: &Polygon) -> bool {
    if points.len() == 1 {
        return locate_in_polygon(poly, points[0]) == Location::Inside;
    }
    segments(points).any(|(c, d)| {
        piece_locations(c, d, poly).contains(&Location::Inside)
    })
}

fn path_meets_boundary(points: &[Coord], poly: &Polygon) -> bool {
    segments(points).any(|(c, d)| {
        !each_boundary_segment(poly, &Rect::of_segment(c, d), |a, b| {
            segment::intersection(c, d, a, b).is_none()
        })
    })
}

fn line_covers_line(line: &Line, other: &Line) -> bool {
    if !other.points().iter().all(|p| point_on_line(*p, line)) {
        return false;
    }
    segments(other.points()).all(|(c, d)| {
        if c == d {
            return true;
        }
        let mut spans: Vec<(f64, f64)> = segments(line.points())
            .filter(|(a, b)| segment::orient(c, d, *a) == 0.0 && segment::orient(c, d, *b) == 0.0)
            .map(|(a, b)| {
                let (ta, tb) = (segment::param(c, d, a), segment::param(c, d, b));
                (ta.min(tb), ta.max(tb))
            })
            .collect();
        spans.sort_by(|x, y| x.0.total_cmp(&y.0));
        let mut reach = 0.0f64;
        for (lo, hi) in spans {
            if lo > reach {
                break;
            }
            reach = reach.max(hi);
        }
        reach >= 1.0
    })
}

fn lines_interiors_intersect(a: &Line, b: &Line) -> bool {
    for (p, q) in segments(a.points()) {
        let rect = Rect::of_segment(p, q);
        for (r, s) in segments(b.points()) {
            if !rect.intersects(&Rect::of_segment(r, s)) {
                continue;
            }
            match segment::intersection(p, q, r, s) {
                Some(Hit::Overlap(..)) => return true,
                Some(Hit::Point(x)) if !in_line_boundary(x, a) && !in_line_boundary(x, b) => {
                    return true
                }
                _ => {}
            }
        }
    }
    false
}

fn polys_intersect(a: &Polygon, b: &Polygon) -> bool {
    let first = |p: &Polygon| p.exterior().points().first().copied();
    if first(a).is_some_and(|c| locate_in_polygon(b, c) != Location::Outside)
        || first(b).is_some_and(|c| locate_in_polygon(a, c) != Location::Outside)
    {
        return true;
    }
    a.rings().any(|ring| path_meets_boundary(ring.points(), b))
}

fn poly_covers_poly(a: &Polygon, b: &Polygon) -> bool {
    b.rings().all(|ring| poly_covers_path(a, ring.points()))
        && a.holes().iter().all(|hole| {
            interior_point(std::iter::once(hole))
                .map_or(true, |p| locate_in_polygon(b, p) != Location::Inside)
        })
}

fn polys_interiors_intersect(a: &Polygon, b: &Polygon) -> bool {
    a.rings().any(|ring| path_enters_interior(ring.points(), b))
        || b.rings().any(|ring| path_enters_interior(ring.points(), a))
        || interior_point(a.rings()).is_some_and(|p| locate_in_polygon(b, p) == Location::Inside)
        || interior_point(b.rings()).is_some_and(|p| locate_in_polygon(a, p) == Location::Inside)
}

/// Whether the parts share at least one point.
pub(crate) fn intersects(a: &Part<'_>, b: &Part<'_>) -> bool {
    match (a, b) {
        (Part::Point(p), Part::Point(q)) => p == q,
        (Part::Point(p), Part::Line(l)) | (Part::Line(l), Part::Point(p)) => point_on_line(*p, l),
        (Part::Point(p), Part::Poly(g)) | (Part::Poly(g), Part::Point(p)) => {
            locate_in_polygon(g, *p) != Location::Outside
        }
        (Part::Line(l), Part::Line(m)) => segments(l.points()).any(|(p, q)| {
            segments(m.points()).any(|(r, s)| segment::intersection(p, q, r, s).is_some())
        }),
        (Part::Line(l), Part::Poly(g)) | (Part::Poly(g), Part::Line(l)) => {
            l.points()
                .first()
                .is_some_and(|c| locate_in_polygon(g, *c) != Location::Outside)
                || path_meets_boundary(l.points(), g)
        }
        (Part::Poly(g), Part::Poly(h)) => polys_intersect(g, h),
    }
}

/// Whether no point of `b` lies outside `a`.
pub(crate) fn covers(a: &Part<'_>, b: &Part<'_>) -> bool {
    match (a, b) {
        (Part::Point(p), Part::Point(q)) => p == q,
        (Part::Point(p), Part::Line(l)) => l.points().iter().all(|c| c == p),
        (Part::Point(_), Part::Poly(_)) | (Part::Line(_), Part::Poly(_)) => false,
        (Part::Line(l), Part::Point(p)) => point_on_line(*p, l),
        (Part::Line(l), Part::Line(m)) => line_covers_line(l, m),
        (Part::Poly(g), Part::Point(p)) => locate_in_polygon(g, *p) != Location::Outside,
        (Part::Poly(g), Part::Line(l)) => poly_covers_path(g, l.points()),
        (Part::Poly(g), Part::Poly(h)) => poly_covers_poly(g, h),
    }
}

/// Whether the interiors of the parts meet.
pub(crate) fn interiors_intersect(a: &Part<'_>, b: &Part<'_>) -> bool {
    match (a, b) {
        (Part::Point(p), Part::Point(q)) => p == q,
        (Part::Point(p), Part::Line(l)) | (Part::Line(l), Part::Point(p)) => {
            point_on_line(*p, l) && !in_line_boundary(*p, l)
        }
        (Part::Point(p), Part::Poly(g)) | (Part::Poly(g), Part::Point(p)) => {
            locate_in_polygon(g, *p) == Location::Inside
        }
        (Part::Line(l), Part::Line(m)) => lines_interiors_intersect(l, m),
        (Part::Line(l), Part::Poly(g)) | (Part::Poly(g), Part::Line(l)) => {
            path_enters_interior(l.points(), g)
        }
        (Part::Poly(g), Part::Poly(h)) => polys_interiors_intersect(g, h),
    }
}
