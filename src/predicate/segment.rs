//! Segment primitives shared by the relation tests.

use crate::geom::{Coord, Rect};

/// Where two segments meet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Hit {
    /// A single shared point.
    Point(Coord),
    /// A collinear overlap of positive length, given by its two ends.
    Overlap(Coord, Coord),
}

/// Twice the signed area of `a b c`; positive when `c` lies left of `a -> b`.
pub(crate) fn orient(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether `p` lies on the closed segment `a b`.
pub(crate) fn on_segment(p: Coord, a: Coord, b: Coord) -> bool {
    orient(a, b, p) == 0.0 && Rect::of_segment(a, b).contains_coord(p)
}

/// Position of `q` along `c -> d` as a fraction of its length, unclamped.
pub(crate) fn param(c: Coord, d: Coord, q: Coord) -> f64 {
    let dx = d.x - c.x;
    let dy = d.y - c.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        0.0
    } else {
        ((q.x - c.x) * dx + (q.y - c.y) * dy) / len2
    }
}

/// Point at fraction `t` along `c -> d`.
pub(crate) fn lerp(c: Coord, d: Coord, t: f64) -> Coord {
    Coord::new(c.x + (d.x - c.x) * t, c.y + (d.y - c.y) * t)
}

/// Intersection of the closed segments `a b` and `c d`.
///
/// When the segments meet at an input endpoint, that endpoint is returned
/// exactly rather than recomputed.
pub(crate) fn intersection(a: Coord, b: Coord, c: Coord, d: Coord) -> Option<Hit> {
    if !Rect::of_segment(a, b).intersects(&Rect::of_segment(c, d)) {
        return None;
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    if o1 == 0.0 && o2 == 0.0 {
        return collinear(a, b, c, d);
    }
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if o1 * o2 > 0.0 || o3 * o4 > 0.0 {
        return None;
    }
    for (p, s, e, o) in [(c, a, b, o1), (d, a, b, o2), (a, c, d, o3), (b, c, d, o4)] {
        if o == 0.0 && Rect::of_segment(s, e).contains_coord(p) {
            return Some(Hit::Point(p));
        }
    }
    if o1 == 0.0 || o2 == 0.0 || o3 == 0.0 || o4 == 0.0 {
        return None;
    }
    let r = Coord::new(b.x - a.x, b.y - a.y);
    let s = Coord::new(d.x - c.x, d.y - c.y);
    let denom = r.x * s.y - r.y * s.x;
    if denom == 0.0 {
        return None;
    }
    let t = ((c.x - a.x) * s.y - (c.y - a.y) * s.x) / denom;
    Some(Hit::Point(lerp(a, b, t.clamp(0.0, 1.0))))
}

fn collinear(a: Coord, b: Coord, c: Coord, d: Coord) -> Option<Hit> {
    let mut shared: [Option<Coord>; 4] = [None; 4];
    for (slot, (p, s, e)) in shared
        .iter_mut()
        .zip([(c, a, b), (d, a, b), (a, c, d), (b, c, d)])
    {
        if on_segment(p, s, e) {
            *slot = Some(p);
        }
    }
    let (dir_s, dir_e) = if a == b { (c, d) } else { (a, b) };
    let mut lo: Option<(f64, Coord)> = None;
    let mut hi: Option<(f64, Coord)> = None;
    for p in shared.into_iter().flatten() {
        let t = param(dir_s, dir_e, p);
        if lo.map_or(true, |(lt, _)| t < lt) {
            lo = Some((t, p));
        }
        if hi.map_or(true, |(ht, _)| t > ht) {
            hi = Some((t, p));
        }
    }
    match (lo, hi) {
        (Some((_, p)), Some((_, q))) if p != q => Some(Hit::Overlap(p, q)),
        (Some((_, p)), _) => Some(Hit::Point(p)),
        _ => None,
    }
}
