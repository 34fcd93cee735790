#![allow(missing_docs)]

use std::path::Path;

use rusqlite::Connection;
use sqlite_tg::{register, register_with, IndexKind, Result, TgOptions};
use tempfile::TempDir;

fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    register(&conn)?;
    Ok(conn)
}

fn count_hits(conn: &Connection, query: &str) -> Result<i64> {
    Ok(conn.query_row(
        "select count(*) from places where tg_intersects(_shape, ?1)",
        [query],
        |row| row.get(0),
    )?)
}

#[test]
fn rows_survive_reopen() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("places.db");
    {
        let conn = open(&path)?;
        conn.execute_batch("create virtual table places using tg0(name)")?;
        let tx = conn.unchecked_transaction()?;
        for i in 0..200_i32 {
            let x = f64::from(i % 20) * 10.0;
            let y = f64::from(i / 20) * 10.0;
            tx.execute(
                "insert into places(_shape, name) values (tg_point_wkt(?1, ?2), ?3)",
                rusqlite::params![x, y, format!("p{i}")],
            )?;
        }
        tx.commit()?;
        assert_eq!(count_hits(&conn, "POLYGON((-1 -1,25 -1,25 25,-1 25,-1 -1))")?, 9);
    }

    let conn = open(&path)?;
    assert_eq!(count_hits(&conn, "POLYGON((-1 -1,25 -1,25 25,-1 25,-1 -1))")?, 9);
    let total: i64 = conn.query_row("select count(*) from places", [], |row| row.get(0))?;
    assert_eq!(total, 200);
    let name: String = conn.query_row(
        "select name from places where tg_intersects(_shape, 'POINT(190 90)')",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(name, "p199");
    Ok(())
}

#[test]
fn rollback_discards_rows() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    let conn = open(&dir.path().join("rollback.db"))?;
    conn.execute_batch(
        "create virtual table places using tg0(name);
         insert into places(_shape, name) values ('POINT(0 0)', 'kept');
         begin;
         insert into places(_shape, name) values ('POINT(1 1)', 'gone');
         rollback;",
    )?;
    assert_eq!(count_hits(&conn, "POLYGON((-5 -5,5 -5,5 5,-5 5,-5 -5))")?, 1);
    Ok(())
}

#[test]
fn registration_options_apply_to_reopened_tables() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("opts.db");
    {
        let conn = open(&path)?;
        conn.execute_batch(
            "create virtual table places using tg0(name);
             insert into places(_shape, name) values ('POLYGON((0 0,10 0,10 10,0 10,0 0))', 'sq');",
        )?;
    }
    let conn = Connection::open(&path)?;
    register_with(
        &conn,
        TgOptions {
            default_index: IndexKind::YStripes,
            ..TgOptions::default()
        },
    )?;
    assert_eq!(count_hits(&conn, "POINT(5 5)")?, 1);
    assert!(conn
        .query_row("select tg_debug()", [], |row| row.get::<_, String>(0))?
        .contains("ystripes"));
    Ok(())
}
