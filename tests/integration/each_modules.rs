#![allow(missing_docs)]

use rusqlite::{params, Connection};
use sqlite_tg::{register, Result};

fn conn() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    register(&conn)?;
    Ok(conn)
}

fn members(conn: &Connection, function: &str, source: &str) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(&format!(
        "select rowid, tg_to_wkt({}) from {function}(?1)",
        column_of(function)
    ))?;
    let rows = stmt
        .query_map([source], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn column_of(function: &str) -> &'static str {
    match function {
        "tg_points_each" => "point",
        "tg_lines_each" => "line",
        "tg_polygons_each" => "polygon",
        "tg_holes_each" => "hole",
        _ => "geometry",
    }
}

#[test]
fn points_each() -> Result<()> {
    let conn = conn()?;
    assert_eq!(
        members(&conn, "tg_points_each", "MULTIPOINT(1 1, 2 2, 3 3)")?,
        [
            (0, "POINT(1 1)".to_owned()),
            (1, "POINT(2 2)".to_owned()),
            (2, "POINT(3 3)".to_owned()),
        ]
    );
    assert!(members(&conn, "tg_points_each", "LINESTRING(0 0, 1 1)")?.is_empty());
    Ok(())
}

#[test]
fn lines_polygons_and_holes() -> Result<()> {
    let conn = conn()?;
    let lines = members(
        &conn,
        "tg_lines_each",
        "MULTILINESTRING((0 0,1 1),(2 2,3 3))",
    )?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].1, "LINESTRING(2 2,3 3)");

    let polys = members(
        &conn,
        "tg_polygons_each",
        "MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))",
    )?;
    assert_eq!(polys[0].1, "POLYGON((0 0,1 0,1 1,0 0))");

    let holes = members(
        &conn,
        "tg_holes_each",
        "POLYGON((0 0,10 0,10 10,0 10,0 0),(1 1,2 1,2 2,1 1),(5 5,6 5,6 6,5 5))",
    )?;
    assert_eq!(
        holes.iter().map(|(_, w)| w.as_str()).collect::<Vec<_>>(),
        ["POLYGON((1 1,2 1,2 2,1 1))", "POLYGON((5 5,6 5,6 6,5 5))"]
    );
    Ok(())
}

#[test]
fn geometries_each_and_alias() -> Result<()> {
    let conn = conn()?;
    let source = "GEOMETRYCOLLECTION(POINT(1 1),LINESTRING(0 0,1 1))";
    let a = members(&conn, "tg_geometries_each", source)?;
    let b = members(&conn, "tg_each", source)?;
    assert_eq!(a, b);
    assert_eq!(a[1].1, "LINESTRING(0 0,1 1)");
    Ok(())
}

#[test]
fn members_are_geometry_values() -> Result<()> {
    let conn = conn()?;
    let kinds: Vec<String> = conn
        .prepare("select tg_type(point) from tg_points_each(tg_geom('MULTIPOINT(1 1, 2 2)'))")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    assert_eq!(kinds, ["Point", "Point"]);
    Ok(())
}

#[test]
fn null_source_yields_nothing() -> Result<()> {
    let conn = conn()?;
    let n: i64 = conn.query_row("select count(*) from tg_points_each(null)", [], |row| {
        row.get(0)
    })?;
    assert_eq!(n, 0);
    Ok(())
}

#[test]
fn source_is_required() -> Result<()> {
    let conn = conn()?;
    let err = conn
        .prepare("select * from tg_points_each")
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("source argument is required"), "{err}");
    Ok(())
}

#[test]
fn lateral_join_over_table() -> Result<()> {
    let conn = conn()?;
    conn.execute_batch(
        "create table t(id integer primary key, shape text);
         insert into t(shape) values ('MULTIPOINT(0 0, 1 1)'), ('POINT(5 5)');",
    )?;
    let n: i64 = conn.query_row(
        "select count(*) from t, tg_points_each(t.shape)",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(n, 3);
    Ok(())
}

#[test]
fn bbox_table_function() -> Result<()> {
    let conn = conn()?;
    let row: (f64, f64, f64, f64) = conn.query_row(
        "select minX, maxX, minY, maxY from tg_bbox(?1)",
        params!["LINESTRING(3 -1, -2 4)"],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    assert_eq!(row, (-2.0, 3.0, -1.0, 4.0));

    let empty: (Option<f64>, i64) = conn.query_row(
        "select max(minX), count(*) from tg_bbox('POINT EMPTY')",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(empty, (None, 1));
    Ok(())
}
