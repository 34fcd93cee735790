#![allow(missing_docs)]

use rusqlite::{params, Connection};
use sqlite_tg::{register, register_with, IndexKind, Result, TgOptions};

fn conn() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    register(&conn)?;
    Ok(conn)
}

fn text(conn: &Connection, sql: &str) -> Result<String> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

fn flag(conn: &Connection, sql: &str) -> Result<bool> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

#[test]
fn version_and_debug() -> Result<()> {
    let conn = conn()?;
    let version = text(&conn, "select tg_version()")?;
    assert!(version.starts_with('v'));
    let debug = text(&conn, "select tg_debug()")?;
    assert_eq!(debug.lines().count(), 3);
    assert!(debug.contains("default_index=natural"));

    let conn = Connection::open_in_memory()?;
    register_with(&conn, TgOptions::large_polygons())?;
    assert!(text(&conn, "select tg_debug()")?.contains("default_index=ystripes"));
    Ok(())
}

#[test]
fn type_of_each_input_format() -> Result<()> {
    let conn = conn()?;
    assert_eq!(text(&conn, "select tg_type('POINT(1 2)')")?, "Point");
    assert_eq!(
        text(&conn, r#"select tg_type('{"type":"LineString","coordinates":[[0,0],[1,1]]}')"#)?,
        "LineString"
    );
    assert_eq!(
        text(&conn, "select tg_type(tg_to_wkb('MULTIPOINT(0 0, 1 1)'))")?,
        "MultiPoint"
    );
    assert_eq!(
        text(&conn, "select tg_type(tg_geom('POLYGON((0 0,1 0,1 1,0 0))'))")?,
        "Polygon"
    );
    Ok(())
}

#[test]
fn conversions_are_canonical() -> Result<()> {
    let conn = conn()?;
    assert_eq!(
        text(&conn, "select tg_to_wkt('point (1 2)')")?,
        "POINT(1 2)"
    );
    assert_eq!(
        text(&conn, "select tg_to_geojson('POINT(1 2)')")?,
        r#"{"type":"Point","coordinates":[1,2]}"#
    );
    assert_eq!(
        text(&conn, "select tg_to_wkt(tg_to_wkb('LINESTRING(0 0, 1 1)'))")?,
        "LINESTRING(0 0,1 1)"
    );
    let wkb: Vec<u8> = conn.query_row("select tg_to_wkb('POINT(1 2)')", [], |row| row.get(0))?;
    assert_eq!(wkb.len(), 21);
    assert_eq!(wkb[0], 1);
    Ok(())
}

#[test]
fn geojson_output_is_json_to_sqlite() -> Result<()> {
    let conn = conn()?;
    let kind = text(&conn, "select json_type(tg_to_geojson('POINT(1 2)'), '$.coordinates')")?;
    assert_eq!(kind, "array");
    let nested = text(
        &conn,
        "select json_object('geometry', tg_to_geojson('POINT(1 2)'))",
    )?;
    assert_eq!(
        nested,
        r#"{"geometry":{"type":"Point","coordinates":[1,2]}}"#
    );
    Ok(())
}

#[test]
fn points_from_numbers() -> Result<()> {
    let conn = conn()?;
    assert_eq!(text(&conn, "select tg_point_wkt(1, 2.5)")?, "POINT(1 2.5)");
    assert_eq!(
        text(&conn, "select tg_point_geojson(1, 2)")?,
        r#"{"type":"Point","coordinates":[1,2]}"#
    );
    assert_eq!(text(&conn, "select tg_to_wkt(tg_point(3, 4))")?, "POINT(3 4)");
    let err = text(&conn, "select tg_point_wkt('a', 2)").unwrap_err();
    assert!(err.to_string().contains("point X value must be an integer or float"));
    let err = text(&conn, "select tg_point_wkt(1, null)").unwrap_err();
    assert!(err.to_string().contains("point Y value"));
    Ok(())
}

#[test]
fn constructors() -> Result<()> {
    let conn = conn()?;
    assert_eq!(
        text(
            &conn,
            "select tg_to_wkt(tg_multipoint(tg_point(0, 0), 'POINT(1 1)'))"
        )?,
        "MULTIPOINT(0 0,1 1)"
    );
    let err = text(
        &conn,
        "select tg_multipoint(tg_point(0, 0), 'POINT(1 1)', 'MULTIPOINT(2 2, 3 3)')",
    )
    .unwrap_err();
    assert!(
        err.to_string()
            .contains("at index 2 expected a point, found MultiPoint"),
        "{err}"
    );
    assert_eq!(
        text(&conn, "select tg_to_wkt(tg_line('POINT(0 0)', 'POINT(1 1)', 'POINT(2 0)'))")?,
        "LINESTRING(0 0,1 1,2 0)"
    );
    assert_eq!(
        text(
            &conn,
            "select tg_to_wkt(tg_poly_exterior('POLYGON((0 0,4 0,4 4,0 4,0 0),(1 1,2 1,2 2,1 1))'))"
        )?,
        "LINESTRING(0 0,4 0,4 4,0 4,0 0)"
    );
    let err = text(&conn, "select tg_to_wkt(tg_line('LINESTRING(0 0, 1 1)'))").unwrap_err();
    assert!(err.to_string().contains("ValueError"), "{err}");
    Ok(())
}

#[test]
fn geom_index_option() -> Result<()> {
    let conn = conn()?;
    for kind in [IndexKind::None, IndexKind::Natural, IndexKind::YStripes] {
        let sql = format!(
            "select tg_intersects(tg_geom('POLYGON((0 0,10 0,10 10,0 10,0 0))', '{}'), 'POINT(5 5)')",
            kind.name()
        );
        assert!(flag(&conn, &sql)?);
    }
    let err = text(&conn, "select tg_geom('POINT(0 0)', 'quadtree')").unwrap_err();
    assert!(err.to_string().contains("unrecognized index option"));
    Ok(())
}

#[test]
fn validators_never_raise() -> Result<()> {
    let conn = conn()?;
    assert!(flag(&conn, "select tg_valid_wkt('POINT(1 1)')")?);
    assert!(!flag(&conn, "select tg_valid_wkt('POINT(1')")?);
    assert!(!flag(&conn, "select tg_valid_wkt(12)")?);
    assert!(flag(&conn, "select tg_valid_wkb(tg_to_wkb('POINT(1 1)'))")?);
    assert!(flag(&conn, "select tg_valid_wkb(tg_point(1, 1))")?);
    assert!(!flag(&conn, "select tg_valid_wkb(x'0102')")?);
    assert!(flag(
        &conn,
        r#"select tg_valid_geojson('{"type":"Point","coordinates":[1,1]}')"#
    )?);
    assert!(!flag(&conn, "select tg_valid_geojson('{\"type\":\"Nope\"}')")?);
    Ok(())
}

#[test]
fn extra_json_of_features() -> Result<()> {
    let conn = conn()?;
    let extra = text(
        &conn,
        r#"select tg_extra_json('{"type":"Point","coordinates":[1,1],"id":7}')"#,
    )?;
    assert_eq!(extra, r#"{"id":7}"#);
    let none: Option<String> =
        conn.query_row("select tg_extra_json('POINT(1 1)')", [], |row| row.get(0))?;
    assert_eq!(none, None);
    Ok(())
}

#[test]
fn predicates() -> Result<()> {
    let conn = conn()?;
    let square = "POLYGON((0 0,10 0,10 10,0 10,0 0))";
    let cases = [
        ("tg_intersects", "POINT(5 5)", true),
        ("tg_intersects", "POINT(50 5)", false),
        ("tg_disjoint", "POINT(50 5)", true),
        ("tg_contains", "POINT(5 5)", true),
        ("tg_contains", "POINT(0 5)", false),
        ("tg_covers", "POINT(0 5)", true),
        ("tg_touches", "POINT(0 5)", true),
        ("tg_touches", "POINT(5 5)", false),
    ];
    for (function, other, expected) in cases {
        let hit: bool = conn.query_row(
            &format!("select {function}(?1, ?2)"),
            params![square, other],
            |row| row.get(0),
        )?;
        assert_eq!(hit, expected, "{function}({square}, {other})");
    }
    assert!(flag(&conn, "select tg_within('POINT(5 5)', 'POLYGON((0 0,10 0,10 10,0 10,0 0))')")?);
    assert!(flag(&conn, "select tg_coveredby('POINT(0 5)', 'POLYGON((0 0,10 0,10 10,0 10,0 0))')")?);
    Ok(())
}

#[test]
fn bad_input_is_reported() -> Result<()> {
    let conn = conn()?;
    let err = text(&conn, "select tg_type(12)").unwrap_err();
    assert!(err.to_string().contains("invalid geometry input"), "{err}");
    let err = text(&conn, "select tg_type('POINT(1')").unwrap_err();
    assert!(err.to_string().contains("ParseError"), "{err}");
    let err = text(&conn, "select tg_type(x'00')").unwrap_err();
    assert!(err.to_string().contains("invalid binary"), "{err}");
    Ok(())
}
