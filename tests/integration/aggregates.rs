#![allow(missing_docs)]

use rusqlite::Connection;
use sqlite_tg::{register, Result};

fn conn() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    register(&conn)?;
    conn.execute_batch(
        "create table shapes(id integer primary key, grp text, shape text, props text);
         insert into shapes(grp, shape, props) values
           ('a', 'POINT(1 1)', '{\"name\":\"one\"}'),
           ('a', 'POINT(2 2)', null),
           ('b', 'POLYGON((0 0,1 0,1 1,0 1,0 0))', '{\"name\":\"sq\"}'),
           ('b', 'POLYGON((5 5,6 5,6 6,5 6,5 5))', null);",
    )?;
    Ok(conn)
}

fn text(conn: &Connection, sql: &str) -> Result<Option<String>> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

#[test]
fn group_multipoint_in_row_order() -> Result<()> {
    let conn = conn()?;
    let wkt = text(
        &conn,
        "select tg_to_wkt(tg_group_multipoint(shape)) from (select shape from shapes where grp = 'a' order by id)",
    )?;
    assert_eq!(wkt.as_deref(), Some("MULTIPOINT(1 1,2 2)"));

    let err = text(&conn, "select tg_group_multipoint(shape) from shapes").unwrap_err();
    assert!(err.to_string().contains("must be Point geometries"), "{err}");
    Ok(())
}

#[test]
fn group_multipolygon() -> Result<()> {
    let conn = conn()?;
    let wkt = text(
        &conn,
        "select tg_to_wkt(tg_group_multipolygon(shape)) from (select shape from shapes where grp = 'b' order by id)",
    )?;
    assert_eq!(
        wkt.as_deref(),
        Some("MULTIPOLYGON(((0 0,1 0,1 1,0 1,0 0)),((5 5,6 5,6 6,5 6,5 5)))")
    );
    let err = text(&conn, "select tg_group_multipolygon(shape) from shapes").unwrap_err();
    assert!(err.to_string().contains("Polygon geometries"), "{err}");
    Ok(())
}

#[test]
fn group_bbox_covers_every_row() -> Result<()> {
    let conn = conn()?;
    let wkt = text(&conn, "select tg_to_wkt(tg_group_bbox(shape)) from shapes")?;
    assert_eq!(wkt.as_deref(), Some("POLYGON((0 0,6 0,6 6,0 6,0 0))"));
    let empty = text(
        &conn,
        "select tg_group_bbox(shape) from shapes where grp = 'none'",
    )?;
    assert_eq!(empty, None);
    Ok(())
}

#[test]
fn groups_are_independent() -> Result<()> {
    let conn = conn()?;
    let mut stmt = conn.prepare(
        "select grp, tg_type(tg_group_geometry_collection(shape)), count(*) from shapes group by grp order by grp",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    assert_eq!(
        rows,
        [
            ("a".to_owned(), "GeometryCollection".to_owned(), 2),
            ("b".to_owned(), "GeometryCollection".to_owned(), 2),
        ]
    );
    Ok(())
}

#[test]
fn empty_groups() -> Result<()> {
    let conn = conn()?;
    let wkt = text(
        &conn,
        "select tg_to_wkt(tg_group_geometry_collection(shape)) from shapes where 0",
    )?;
    assert_eq!(wkt.as_deref(), Some("GEOMETRYCOLLECTION EMPTY"));
    let wkt = text(
        &conn,
        "select tg_to_wkt(tg_group_multipoint(shape)) from shapes where 0",
    )?;
    assert_eq!(wkt.as_deref(), Some("MULTIPOINT EMPTY"));
    let fc = text(
        &conn,
        "select tg_group_feature_collection_geojson(shape) from shapes where 0",
    )?;
    assert_eq!(fc, None);
    Ok(())
}

#[test]
fn feature_collection_with_properties() -> Result<()> {
    let conn = conn()?;
    let fc = text(
        &conn,
        "select tg_group_feature_collection_geojson(shape, props) from (select * from shapes where grp = 'a' order by id)",
    )?
    .unwrap_or_default();
    assert_eq!(
        fc,
        concat!(
            r#"{"type":"FeatureCollection","features":["#,
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,1]},"properties":{"name":"one"}},"#,
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[2,2]},"properties":{}}"#,
            "]}"
        )
    );

    let count: i64 = conn.query_row(
        "select json_array_length(tg_group_feature_collection_geojson(shape), '$.features') from shapes",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(count, 4);
    Ok(())
}

#[test]
fn feature_collection_accepts_json_subtype() -> Result<()> {
    let conn = conn()?;
    let fc = text(
        &conn,
        "select tg_group_feature_collection_geojson(shape, json_object('id', id)) from shapes where id = 3",
    )?
    .unwrap_or_default();
    assert!(fc.contains(r#""properties":{"id":3}"#), "{fc}");
    Ok(())
}

#[test]
fn feature_collection_rejects_malformed_properties() -> Result<()> {
    let conn = conn()?;
    let err = text(
        &conn,
        "select tg_group_feature_collection_geojson('POINT(1 1)', '{bad json')",
    )
    .unwrap_err();
    assert!(err.to_string().contains("ValueError"), "{err}");
    assert!(err.to_string().contains("must be valid JSON"), "{err}");

    let valid: i64 = conn.query_row(
        "select json_valid(tg_group_feature_collection_geojson(shape, props)) from shapes",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(valid, 1);
    Ok(())
}
