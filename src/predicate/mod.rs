//! Spatial predicates.
//!
//! Each relation first compares bounding boxes and only then runs the exact
//! test over the singular parts of both geometries. Multi-part geometries
//! relate part by part: `a` covers `b` when every part of `b` is covered by
//! some part of `a`, and interiors meet when any pair of parts' interiors do.

mod relate;
mod segment;

use std::fmt;

use crate::geom::{Geom, Part};

/// One of the seven supported binary relations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// The geometries share at least one point.
    Intersects,
    /// The geometries share no point.
    Disjoint,
    /// `b` lies in `a` and their interiors meet.
    Contains,
    /// `a` lies in `b` and their interiors meet.
    Within,
    /// No point of `b` lies outside `a`.
    Covers,
    /// No point of `a` lies outside `b`.
    CoveredBy,
    /// The geometries meet only along their boundaries.
    Touches,
}

impl Predicate {
    /// Every predicate, in constraint-code order.
    pub const ALL: [Predicate; 7] = [
        Predicate::Intersects,
        Predicate::Disjoint,
        Predicate::Contains,
        Predicate::Within,
        Predicate::Covers,
        Predicate::CoveredBy,
        Predicate::Touches,
    ];

    /// Lowercase relation name.
    pub fn name(self) -> &'static str {
        match self {
            Predicate::Intersects => "intersects",
            Predicate::Disjoint => "disjoint",
            Predicate::Contains => "contains",
            Predicate::Within => "within",
            Predicate::Covers => "covers",
            Predicate::CoveredBy => "coveredby",
            Predicate::Touches => "touches",
        }
    }

    /// SQL function name, e.g. `tg_intersects`.
    pub fn function_name(self) -> &'static str {
        match self {
            Predicate::Intersects => "tg_intersects",
            Predicate::Disjoint => "tg_disjoint",
            Predicate::Contains => "tg_contains",
            Predicate::Within => "tg_within",
            Predicate::Covers => "tg_covers",
            Predicate::CoveredBy => "tg_coveredby",
            Predicate::Touches => "tg_touches",
        }
    }

    /// Looks a predicate up by SQL function name, ignoring case.
    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.function_name().eq_ignore_ascii_case(name))
    }

    /// Evaluates the relation.
    pub fn evaluate(self, a: &Geom, b: &Geom) -> bool {
        match self {
            Predicate::Intersects => intersects(a, b),
            Predicate::Disjoint => disjoint(a, b),
            Predicate::Contains => contains(a, b),
            Predicate::Within => within(a, b),
            Predicate::Covers => covers(a, b),
            Predicate::CoveredBy => coveredby(a, b),
            Predicate::Touches => touches(a, b),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn part_pairs_any<F>(a: &Geom, b: &Geom, mut test: F) -> bool
where
    F: FnMut(&Part<'_>, &Part<'_>) -> bool,
{
    let (pa, pb) = (a.shape().parts(), b.shape().parts());
    pa.iter().any(|x| {
        let rx = x.rect();
        pb.iter().any(|y| {
            let boxes_meet = match (rx, y.rect()) {
                (Some(r), Some(s)) => r.intersects(&s),
                _ => false,
            };
            boxes_meet && test(x, y)
        })
    })
}

fn boxes_intersect(a: &Geom, b: &Geom) -> bool {
    match (a.rect(), b.rect()) {
        (Some(r), Some(s)) => r.intersects(&s),
        _ => false,
    }
}

fn interiors_intersect(a: &Geom, b: &Geom) -> bool {
    boxes_intersect(a, b) && part_pairs_any(a, b, relate::interiors_intersect)
}

/// Whether `a` and `b` share at least one point.
pub fn intersects(a: &Geom, b: &Geom) -> bool {
    boxes_intersect(a, b) && part_pairs_any(a, b, relate::intersects)
}

/// Negation of [`intersects`].
pub fn disjoint(a: &Geom, b: &Geom) -> bool {
    !intersects(a, b)
}

/// Whether no point of `b` lies outside `a`. Empty geometries are never covered.
pub fn covers(a: &Geom, b: &Geom) -> bool {
    let (Some(ra), Some(rb)) = (a.rect(), b.rect()) else {
        return false;
    };
    if !ra.contains_rect(&rb) {
        return false;
    }
    let pa = a.shape().parts();
    let pb = b.shape().parts();
    !pb.is_empty()
        && pb.iter().all(|y| {
            let ry = y.rect();
            pa.iter().any(|x| {
                let fits = match (x.rect(), ry) {
                    (Some(r), Some(s)) => r.contains_rect(&s),
                    _ => false,
                };
                fits && relate::covers(x, y)
            })
        })
}

/// Argument swap of [`covers`].
pub fn coveredby(a: &Geom, b: &Geom) -> bool {
    covers(b, a)
}

/// Whether `b` lies in `a` and at least one interior point of `b` is interior to `a`.
pub fn contains(a: &Geom, b: &Geom) -> bool {
    covers(a, b) && interiors_intersect(a, b)
}

/// Argument swap of [`contains`].
pub fn within(a: &Geom, b: &Geom) -> bool {
    contains(b, a)
}

/// Whether the geometries meet but their interiors do not.
pub fn touches(a: &Geom, b: &Geom) -> bool {
    intersects(a, b) && !interiors_intersect(a, b)
}
