#![allow(missing_docs)]

use std::sync::Once;

use rusqlite::{params, Connection};
use sqlite_tg::{register, Result};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn demo() -> Result<Connection> {
    init_tracing();
    let conn = Connection::open_in_memory()?;
    register(&conn)?;
    conn.execute_batch(
        "create virtual table demo using tg0(name text, weight);
         insert into demo(_shape, name, weight) values
           ('POINT(1 1)', 'a', 1),
           ('POINT(5 5)', 'b', 2.5),
           ('LINESTRING(20 20, 30 30)', 'c', null),
           ('POLYGON((40 40,50 40,50 50,40 50,40 40))', 'd', 4);",
    )?;
    Ok(conn)
}

fn names(conn: &Connection, sql: &str, query: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([query], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn plan(conn: &Connection, sql: &str) -> Result<String> {
    let mut stmt = conn.prepare(&format!("explain query plan {sql}"))?;
    let details = stmt
        .query_map([], |row| row.get::<_, String>(3))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(details.join("\n"))
}

#[test]
fn full_scan_in_id_order() -> Result<()> {
    let conn = demo()?;
    let mut stmt = conn.prepare("select rowid, tg_to_wkt(_shape), name, weight from demo")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], (1, "POINT(1 1)".to_owned(), "a".to_owned(), Some(1.0)));
    assert_eq!(rows[2].3, None);
    assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(plan(&conn, "select * from demo")?.contains("INDEX 0:fullscan"));
    Ok(())
}

#[test]
fn scans_span_many_pages() -> Result<()> {
    init_tracing();
    let conn = Connection::open_in_memory()?;
    register(&conn)?;
    conn.execute_batch("create virtual table grid using tg0(label)")?;
    let tx = conn.unchecked_transaction()?;
    for i in 0..1_000_i64 {
        // Sparse ids make the pages end on gaps.
        tx.execute(
            "insert into grid(rowid, _shape, label) values (?1, tg_point(?2, ?3), ?4)",
            params![i * 3 + 1, (i % 40) as f64, (i / 40) as f64, i],
        )?;
    }
    tx.commit()?;

    let mut stmt = conn.prepare("select rowid, label from grid")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    assert_eq!(rows.len(), 1_000);
    assert!(rows.iter().enumerate().all(|(i, &(id, label))| {
        id == i as i64 * 3 + 1 && label == i as i64
    }));

    let hits: i64 = conn.query_row(
        "select count(*) from grid where tg_intersects(_shape, 'POLYGON((-0.5 -0.5,39.5 -0.5,39.5 9.5,-0.5 9.5,-0.5 -0.5))')",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(hits, 400);

    conn.execute("update grid set label = label + 1", [])?;
    let total: i64 = conn.query_row("select sum(label) from grid", [], |row| row.get(0))?;
    assert_eq!(total, (0..1_000_i64).map(|i| i + 1).sum::<i64>());

    let mut stmt = conn.prepare("select rowid from grid limit 3")?;
    let first = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    assert_eq!(first, vec![1, 4, 7]);
    Ok(())
}

#[test]
fn intersects_is_pushed_down() -> Result<()> {
    let conn = demo()?;
    let sql = "select name from demo where tg_intersects(_shape, ?1)";
    assert_eq!(
        names(&conn, sql, "POLYGON((0 0,10 0,10 10,0 10,0 0))")?,
        ["a", "b"]
    );
    assert_eq!(names(&conn, sql, "POINT(25 25)")?, ["c"]);
    assert_eq!(names(&conn, sql, "POINT(45 45)")?, ["d"]);
    assert!(names(&conn, sql, "POINT(100 100)")?.is_empty());
    assert!(names(&conn, sql, "POINT EMPTY")?.is_empty());

    let detail = plan(
        &conn,
        "select name from demo where tg_intersects(_shape, 'POINT(1 1)')",
    )?;
    assert!(detail.contains("VIRTUAL TABLE INDEX 150:predicate"), "{detail}");
    Ok(())
}

#[test]
fn exact_recheck_drops_box_only_hits() -> Result<()> {
    let conn = demo()?;
    // Inside the line's box but off the line itself.
    let hits = names(
        &conn,
        "select name from demo where tg_intersects(_shape, ?1)",
        "POINT(21 29)",
    )?;
    assert!(hits.is_empty(), "{hits:?}");
    Ok(())
}

#[test]
fn pushdown_matches_scalar_predicate() -> Result<()> {
    let conn = demo()?;
    let query = "POLYGON((4 4,45 4,45 45,4 45,4 4))";
    let pushed = names(
        &conn,
        "select name from demo where tg_intersects(_shape, ?1) order by rowid",
        query,
    )?;
    let scanned = names(
        &conn,
        "select name from demo where +tg_intersects(tg_geom(_shape), ?1) order by rowid",
        query,
    )?;
    assert_eq!(pushed, scanned);
    assert_eq!(pushed, ["b", "c", "d"]);
    Ok(())
}

#[test]
fn other_predicates_and_pairs_are_rejected() -> Result<()> {
    let conn = demo()?;
    let err = conn
        .prepare("select * from demo where tg_contains(_shape, 'POINT(1 1)')")
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("not supported yet for pushdown"), "{err}");
    assert!(err.contains("tg_contains"), "{err}");

    let err = conn
        .prepare(
            "select * from demo where tg_intersects(_shape, 'POINT(1 1)') and tg_intersects(_shape, 'POINT(5 5)')",
        )
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("only 1 predicate is allowed"), "{err}");
    Ok(())
}

#[test]
fn insert_with_explicit_rowid() -> Result<()> {
    let conn = demo()?;
    conn.execute(
        "insert into demo(rowid, _shape, name) values (?1, ?2, ?3)",
        params![100, "POINT(7 7)", "e"],
    )?;
    assert_eq!(conn.last_insert_rowid(), 100);
    let name: String =
        conn.query_row("select name from demo where rowid = 100", [], |row| row.get(0))?;
    assert_eq!(name, "e");
    Ok(())
}

#[test]
fn accepts_every_input_format() -> Result<()> {
    let conn = demo()?;
    conn.execute(
        "insert into demo(_shape, name) values (tg_to_wkb('POINT(8 8)'), 'wkb')",
        [],
    )?;
    conn.execute(
        r#"insert into demo(_shape, name) values ('{"type":"Point","coordinates":[9,9]}', 'json')"#,
        [],
    )?;
    conn.execute(
        "insert into demo(_shape, name) values (tg_point(6, 6), 'tagged')",
        [],
    )?;
    assert_eq!(
        names(
            &conn,
            "select name from demo where tg_intersects(_shape, ?1)",
            "POLYGON((5.5 5.5,10 5.5,10 10,5.5 10,5.5 5.5))"
        )?,
        ["wkb", "json", "tagged"]
    );
    Ok(())
}

#[test]
fn empty_and_invalid_shapes_are_rejected() -> Result<()> {
    let conn = demo()?;
    let err = conn
        .execute("insert into demo(_shape) values ('POINT EMPTY')", [])
        .unwrap_err();
    assert!(err.to_string().contains("non-empty"), "{err}");
    let err = conn
        .execute("insert into demo(_shape) values (42)", [])
        .unwrap_err();
    assert!(err.to_string().contains("invalid geometry input"), "{err}");
    Ok(())
}

#[test]
fn update_moves_the_index_entry() -> Result<()> {
    let conn = demo()?;
    conn.execute(
        "update demo set _shape = 'POINT(60 60)' where name = 'a'",
        [],
    )?;
    let sql = "select name from demo where tg_intersects(_shape, ?1)";
    assert_eq!(names(&conn, sql, "POINT(1 1)")?, Vec::<String>::new());
    assert_eq!(names(&conn, sql, "POINT(60 60)")?, ["a"]);

    conn.execute("update demo set name = 'bb' where rowid = 2", [])?;
    assert_eq!(names(&conn, sql, "POINT(5 5)")?, ["bb"]);

    conn.execute("update demo set rowid = 20 where rowid = 2", [])?;
    let id: i64 = conn.query_row("select rowid from demo where name = 'bb'", [], |row| {
        row.get(0)
    })?;
    assert_eq!(id, 20);
    Ok(())
}

#[test]
fn delete_removes_row_and_index_entry() -> Result<()> {
    let conn = demo()?;
    conn.execute("delete from demo where name = 'b'", [])?;
    let n: i64 = conn.query_row("select count(*) from demo", [], |row| row.get(0))?;
    assert_eq!(n, 3);
    assert!(names(
        &conn,
        "select name from demo where tg_intersects(_shape, ?1)",
        "POINT(5 5)"
    )?
    .is_empty());
    Ok(())
}

#[test]
fn drop_removes_shadow_tables() -> Result<()> {
    let conn = demo()?;
    let shadow: i64 = conn.query_row(
        "select count(*) from sqlite_master where name like 'demo%'",
        [],
        |row| row.get(0),
    )?;
    assert!(shadow > 1);
    conn.execute_batch("drop table demo")?;
    let left: i64 = conn.query_row(
        "select count(*) from sqlite_master where name like 'demo%'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(left, 0);
    Ok(())
}

#[test]
fn rename_is_refused() -> Result<()> {
    let conn = demo()?;
    let err = conn
        .execute_batch("alter table demo rename to demo2")
        .unwrap_err();
    assert!(err.to_string().contains("cannot be renamed"), "{err}");
    let n: i64 = conn.query_row("select count(*) from demo", [], |row| row.get(0))?;
    assert_eq!(n, 4);
    Ok(())
}

#[test]
fn predicate_outside_tg0_still_works() -> Result<()> {
    let conn = demo()?;
    let n: i64 = conn.query_row(
        "select count(*) from demo where tg_intersects('POINT(1 1)', _shape)",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(n, 1);
    Ok(())
}
