#![allow(missing_docs)]

use proptest::prelude::*;
use rusqlite::{params, Connection};
use sqlite_tg::geom::index::IndexSettings;
use sqlite_tg::geom::{Coord, Line, Polygon, Ring};
use sqlite_tg::{codec::wkt, Geom, Geometry, IndexKind, Predicate};

/// Star-shaped ring around the origin with one vertex per radius.
fn star(radii: &[f64]) -> Geom {
    let n = radii.len() as f64;
    let points = radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let angle = std::f64::consts::TAU * i as f64 / n;
            Coord::new(r * angle.cos(), r * angle.sin())
        })
        .collect();
    Geom::new(Geometry::Polygon(Polygon::new(Ring::new(points), Vec::new())))
}

fn point(x: f64, y: f64) -> Geom {
    Geom::new(Geometry::Point(Some(Coord::new(x, y))))
}

fn arb_radii() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..50.0, 8..120)
}

fn arb_coord() -> impl Strategy<Value = (f64, f64)> {
    (-60.0f64..60.0, -60.0f64..60.0)
}

fn arb_segment() -> impl Strategy<Value = Geom> {
    (arb_coord(), arb_coord()).prop_map(|((x1, y1), (x2, y2))| {
        Geom::new(Geometry::LineString(Line::new(vec![
            Coord::new(x1, y1),
            Coord::new(x2, y2),
        ])))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn index_kinds_agree_on_point_in_polygon(radii in arb_radii(), pts in prop::collection::vec(arb_coord(), 1..40)) {
        let base = IndexSettings { min_points: 4, ..IndexSettings::default() };
        let shapes: Vec<Geom> = [IndexKind::None, IndexKind::Natural, IndexKind::YStripes]
            .into_iter()
            .map(|kind| star(&radii).indexed(&base.with_kind(kind)))
            .collect();
        for (x, y) in pts {
            let p = point(x, y);
            let expected = Predicate::Intersects.evaluate(&shapes[0], &p);
            for shape in &shapes[1..] {
                prop_assert_eq!(Predicate::Intersects.evaluate(shape, &p), expected);
                prop_assert_eq!(Predicate::Contains.evaluate(shape, &p), Predicate::Contains.evaluate(&shapes[0], &p));
            }
        }
    }

    #[test]
    fn index_kinds_agree_on_segments(radii in arb_radii(), seg in arb_segment()) {
        let base = IndexSettings { min_points: 4, ..IndexSettings::default() };
        let plain = star(&radii).indexed(&base.with_kind(IndexKind::None));
        let natural = star(&radii).indexed(&base.with_kind(IndexKind::Natural));
        let stripes = star(&radii).indexed(&base.with_kind(IndexKind::YStripes));
        let expected = Predicate::Intersects.evaluate(&plain, &seg);
        prop_assert_eq!(Predicate::Intersects.evaluate(&natural, &seg), expected);
        prop_assert_eq!(Predicate::Intersects.evaluate(&stripes, &seg), expected);
    }

    #[test]
    fn relations_are_consistent(radii in arb_radii(), (x, y) in arb_coord(), seg in arb_segment()) {
        let poly = star(&radii);
        for other in [point(x, y), seg] {
            let intersects = Predicate::Intersects.evaluate(&poly, &other);
            prop_assert_eq!(Predicate::Disjoint.evaluate(&poly, &other), !intersects);
            prop_assert_eq!(Predicate::Intersects.evaluate(&other, &poly), intersects);
            prop_assert_eq!(
                Predicate::Contains.evaluate(&poly, &other),
                Predicate::Within.evaluate(&other, &poly)
            );
            prop_assert_eq!(
                Predicate::Covers.evaluate(&poly, &other),
                Predicate::CoveredBy.evaluate(&other, &poly)
            );
            if Predicate::Contains.evaluate(&poly, &other) {
                prop_assert!(Predicate::Covers.evaluate(&poly, &other));
                prop_assert!(!Predicate::Touches.evaluate(&poly, &other));
            }
        }
    }

    #[test]
    fn wkt_output_reparses_to_the_same_shape(radii in arb_radii()) {
        let poly = star(&radii);
        let text = wkt::write(poly.shape());
        let back = wkt::parse(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(back.shape(), poly.shape());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn tg0_pushdown_matches_scalar_filter(
        pts in prop::collection::vec(arb_coord(), 1..60),
        radii in prop::collection::vec(1.0f64..40.0, 8..24),
    ) {
        let conn = Connection::open_in_memory().map_err(|e| TestCaseError::fail(e.to_string()))?;
        sqlite_tg::register(&conn).map_err(|e| TestCaseError::fail(e.to_string()))?;
        conn.execute_batch("create table plain(id integer primary key, shape); create virtual table spatial using tg0;")
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        for (x, y) in &pts {
            let wkt = format!("POINT({x} {y})");
            conn.execute("insert into plain(shape) values (?1)", params![wkt])
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            conn.execute("insert into spatial(_shape) values (?1)", params![wkt])
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        let query = wkt::write(star(&radii).shape());
        let ids = |sql: &str| -> Result<Vec<i64>, TestCaseError> {
            let mut stmt = conn.prepare(sql).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let rows = stmt
                .query_map([&query], |row| row.get(0))
                .map_err(|e| TestCaseError::fail(e.to_string()))?
                .collect::<rusqlite::Result<Vec<i64>>>()
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            Ok(rows)
        };
        let pushed = ids("select rowid from spatial where tg_intersects(_shape, ?1)")?;
        let scanned = ids("select id from plain where tg_intersects(shape, ?1) order by id")?;
        prop_assert_eq!(pushed, scanned);
    }
}
