#![allow(unsafe_code)]
//! The `tg0` spatial index table.
//!
//! Rows live in one R-tree shadow table, `<name>_rtree`, whose auxiliary
//! columns carry the WKB shape and the user columns. An index entry and its
//! row are therefore a single physical row and always change together.
//!
//! Reads use one of two plans negotiated in [`crate::plan`]: a full scan that
//! pages through row ids, or an R-tree range scan over the query box whose
//! rows are rechecked one at a time as the cursor advances.

use std::collections::VecDeque;
use std::os::raw::c_int;

use rusqlite::types::{Null, Value, ValueRef};
use rusqlite::vtab::{
    escape_double_quote, Context, CreateVTab, IndexConstraintOp, IndexInfo, UpdateVTab, VTab,
    VTabConnection, VTabCursor, VTabKind, Values,
};
use rusqlite::{ffi, params, Connection, OptionalExtension, ToSql};
use tracing::{debug, trace, warn};

use super::value::{decode, Input};
use crate::codec::wkb;
use crate::config::TgOptions;
use crate::error::{Result, TgError};
use crate::geom::{Geom, IndexSettings, Rect};
use crate::plan::{self, Offer, Plan, Scan};
use crate::predicate::Predicate;

/// Suffixes of the tables SQLite should protect as shadow tables.
pub(crate) const SHADOW_SUFFIXES: [&str; 4] = ["rtree", "rtree_node", "rtree_parent", "rtree_rowid"];

/// Row ids fetched per round trip during a full scan.
const PAGE_ROWS: usize = 256;

const MISSING_RTREE: &str =
    "The current SQLite connection does not include the R-Tree extension, which is required by tg0.";

/// Target of an overloaded predicate call on `_shape`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Overload {
    pub(crate) predicate: Predicate,
    pub(crate) settings: IndexSettings,
}

/// One `tg0` table.
#[repr(C)]
pub(crate) struct SpatialTable {
    base: ffi::sqlite3_vtab,
    conn: Connection,
    schema: String,
    name: String,
    columns: usize,
    options: TgOptions,
    settings: IndexSettings,
    overloads: Vec<Overload>,
}

impl SpatialTable {
    fn init(
        db: &mut VTabConnection,
        aux: Option<&TgOptions>,
        args: &[&[u8]],
        create: bool,
    ) -> Result<(String, Self)> {
        // The handle outlives the table; `from_handle` never closes it.
        let conn = unsafe { Connection::from_handle(db.handle()) }?;
        let has_rtree = conn
            .query_row(
                "SELECT name FROM pragma_module_list WHERE name = 'rtree'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !has_rtree {
            return Err(TgError::Sqlite(rusqlite::Error::ModuleError(
                MISSING_RTREE.to_owned(),
            )));
        }
        let [_, schema, name, columns @ ..] = args else {
            return Err(TgError::value("tg0 requires a schema and table name"));
        };
        let schema = utf8(schema)?.to_owned();
        let name = utf8(name)?.to_owned();
        let columns = columns
            .iter()
            .map(|arg| {
                let column = utf8(arg)?.trim();
                if column.is_empty() {
                    Err(TgError::value("tg0 column definitions must not be empty"))
                } else {
                    Ok(column)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut declared = String::from("CREATE TABLE x(_shape");
        for column in &columns {
            declared.push_str(", ");
            declared.push_str(column);
        }
        declared.push(')');

        let options = aux.cloned().unwrap_or_default();
        let settings = IndexSettings::from(&options);
        let table = SpatialTable {
            base: ffi::sqlite3_vtab::default(),
            conn,
            schema,
            name,
            columns: columns.len(),
            overloads: Predicate::ALL
                .into_iter()
                .map(|predicate| Overload {
                    predicate,
                    settings,
                })
                .collect(),
            options,
            settings,
        };
        if create {
            table.conn.execute_batch(&table.create_rtree_sql())?;
            debug!(
                schema = %table.schema,
                table = %table.name,
                columns = table.columns,
                "tg0.create"
            );
        } else {
            debug!(schema = %table.schema, table = %table.name, "tg0.connect");
        }
        Ok((declared, table))
    }

    fn shadow(&self, suffix: &str) -> String {
        format!(
            "\"{}\".\"{}_{suffix}\"",
            escape_double_quote(&self.schema),
            escape_double_quote(&self.name)
        )
    }

    fn rtree(&self) -> String {
        self.shadow("rtree")
    }

    fn aux_names(&self) -> impl Iterator<Item = String> {
        (1..=self.columns).map(|i| format!("c{i}"))
    }

    fn create_rtree_sql(&self) -> String {
        let mut sql = format!(
            "CREATE VIRTUAL TABLE {} USING rtree(id, minX, maxX, minY, maxY, +_shape BLOB",
            self.rtree()
        );
        for column in self.aux_names() {
            sql.push_str(", +");
            sql.push_str(&column);
        }
        sql.push(')');
        sql
    }

    /// Next page of row ids after `after`, read from the R-tree's rowid
    /// table so each page is a primary key range.
    fn id_page(&self, after: Option<i64>) -> Result<Vec<i64>> {
        let table = self.shadow("rtree_rowid");
        let limit = PAGE_ROWS as i64;
        let ids = match after {
            Some(after) => self
                .conn
                .prepare_cached(&format!(
                    "SELECT rowid FROM {table} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
                ))?
                .query_map(params![after, limit], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?,
            None => self
                .conn
                .prepare_cached(&format!("SELECT rowid FROM {table} ORDER BY rowid LIMIT ?1"))?
                .query_map([limit], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?,
        };
        Ok(ids)
    }

    /// Ids of the rows whose box overlaps `query`, ascending.
    fn candidate_ids(&self, query: Rect) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE minX <= ?1 AND maxX >= ?2 AND minY <= ?3 AND maxY >= ?4 ORDER BY id",
            self.rtree()
        );
        let ids = self
            .conn
            .prepare_cached(&sql)?
            .query_map(
                params![query.max.x, query.min.x, query.max.y, query.min.y],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Reads one row, or `None` when it was deleted since its id was listed.
    fn load(&self, id: i64) -> Result<Option<StoredRow>> {
        let mut sql = String::from("SELECT id, _shape");
        for column in self.aux_names() {
            sql.push_str(", ");
            sql.push_str(&column);
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.rtree());
        sql.push_str(" WHERE id = ?1");
        let columns = self.columns;
        let row = self
            .conn
            .prepare_cached(&sql)?
            .query_row([id], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    shape: row.get(1)?,
                    aux: (0..columns)
                        .map(|i| row.get::<_, Value>(2 + i))
                        .collect::<rusqlite::Result<_>>()?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Parses the `_shape` value of an insert or update.
    fn shape_arg(&self, value: Option<ValueRef<'_>>) -> Result<(Rect, Vec<u8>)> {
        let value = value.ok_or_else(|| TgError::value("missing _shape value"))?;
        let geom = decode(Input::new(value, 0), &self.settings)?;
        let rect = geom
            .rect()
            .ok_or_else(|| TgError::value("tg0 _shape must be a non-empty geometry"))?;
        Ok((rect, wkb::write(&geom)))
    }

    /// Checks the argument count of an insert or update and parses its values.
    fn row_args(&self, args: &Values<'_>) -> Result<(Option<i64>, Rect, Vec<u8>, Vec<Value>)> {
        if args.len() != 3 + self.columns {
            return Err(TgError::value(format!(
                "expected {} column values for tg0 table {}, got {}",
                1 + self.columns,
                self.name,
                args.len().saturating_sub(2)
            )));
        }
        let id: Option<i64> = args.get(1)?;
        let (rect, shape) = self.shape_arg(args.iter().nth(2))?;
        let aux = args.iter().skip(3).map(Value::from).collect();
        Ok((id, rect, shape, aux))
    }

    fn insert_row(&self, args: &Values<'_>) -> Result<i64> {
        let (id, rect, shape, aux) = self.row_args(args)?;
        let mut sql = format!(
            "INSERT INTO {}(id, minX, maxX, minY, maxY, _shape",
            self.rtree()
        );
        for column in self.aux_names() {
            sql.push_str(", ");
            sql.push_str(&column);
        }
        sql.push_str(") VALUES (?1, ?2, ?3, ?4, ?5, ?6");
        for i in 0..self.columns {
            sql.push_str(&format!(", ?{}", 7 + i));
        }
        sql.push(')');

        let mut values = shape_params(&id, &rect, &shape);
        values.extend(aux.iter().map(|v| v as &dyn ToSql));
        self.conn.prepare_cached(&sql)?.execute(&values[..])?;
        let id = self.conn.last_insert_rowid();
        trace!(table = %self.name, id, "tg0.insert");
        Ok(id)
    }

    fn update_row(&self, old_id: i64, args: &Values<'_>) -> Result<()> {
        let (new_id, rect, shape, aux) = self.row_args(args)?;
        let mut sql = format!(
            "UPDATE {} SET id = coalesce(?1, id), minX = ?2, maxX = ?3, minY = ?4, maxY = ?5, _shape = ?6",
            self.rtree()
        );
        for (i, column) in self.aux_names().enumerate() {
            sql.push_str(&format!(", {column} = ?{}", 7 + i));
        }
        sql.push_str(&format!(" WHERE id = ?{}", 7 + self.columns));

        let mut values = shape_params(&new_id, &rect, &shape);
        values.extend(aux.iter().map(|v| v as &dyn ToSql));
        values.push(&old_id as &dyn ToSql);
        self.conn.prepare_cached(&sql)?.execute(&values[..])?;
        trace!(table = %self.name, old_id, new_id, "tg0.update");
        Ok(())
    }

    /// Overload record for `predicate`, handed to SQLite as the function argument.
    pub(crate) fn overload(&self, predicate: Predicate) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.predicate == predicate)
    }
}

/// Parameters `?1` through `?6` shared by inserts and updates.
fn shape_params<'a>(id: &'a Option<i64>, rect: &'a Rect, shape: &'a Vec<u8>) -> Vec<&'a dyn ToSql> {
    vec![
        id as &dyn ToSql,
        &rect.min.x as &dyn ToSql,
        &rect.max.x as &dyn ToSql,
        &rect.min.y as &dyn ToSql,
        &rect.max.y as &dyn ToSql,
        shape as &dyn ToSql,
    ]
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| TgError::value("tg0 arguments must be valid UTF-8"))
}

unsafe impl<'vtab> VTab<'vtab> for SpatialTable {
    type Aux = TgOptions;
    type Cursor = SpatialCursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        aux: Option<&TgOptions>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        SpatialTable::init(db, aux, args, false).map_err(TgError::into_module_error)
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let offers: Vec<Offer> = info
            .constraints()
            .map(|c| Offer {
                column: c.column(),
                function: match c.operator() {
                    IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_FUNCTION(code) => {
                        Some(i32::from(code))
                    }
                    _ => None,
                },
                usable: c.is_usable(),
            })
            .collect();
        let plan = match plan::negotiate(&offers) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(table = %self.name, error = %err, "tg0.best_index.rejected");
                return Err(err.into_module_error());
            }
        };
        if let Plan::Predicate { offer, .. } = plan {
            let mut usage = info.constraint_usage(offer);
            usage.set_argv_index(1);
            usage.set_omit(true);
        }
        let (cost, rows) = plan.estimate(&self.options);
        info.set_idx_num(plan.idx_num());
        info.set_idx_str(plan.idx_str());
        info.set_estimated_cost(cost);
        info.set_estimated_rows(rows);
        debug!(table = %self.name, plan = plan.idx_str(), cost, rows, "tg0.best_index");
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<SpatialCursor<'vtab>> {
        Ok(SpatialCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            table: self,
            ids: Ids::Done,
            window: None,
            row: None,
            visited: 0,
        })
    }
}

impl CreateVTab<'_> for SpatialTable {
    const KIND: VTabKind = VTabKind::Default;

    fn create(
        db: &mut VTabConnection,
        aux: Option<&TgOptions>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        SpatialTable::init(db, aux, args, true).map_err(TgError::into_module_error)
    }

    fn destroy(&self) -> rusqlite::Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE {}", self.rtree()))?;
        debug!(schema = %self.schema, table = %self.name, "tg0.destroy");
        Ok(())
    }
}

impl UpdateVTab<'_> for SpatialTable {
    fn delete(&mut self, arg: ValueRef<'_>) -> rusqlite::Result<()> {
        let ValueRef::Integer(id) = arg else {
            return Err(rusqlite::Error::ModuleError(format!(
                "tg0 rowid must be an integer, got {:?}",
                arg.data_type()
            )));
        };
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.rtree());
        self.conn.prepare_cached(&sql)?.execute([id])?;
        trace!(table = %self.name, id, "tg0.delete");
        Ok(())
    }

    fn insert(&mut self, args: &Values<'_>) -> rusqlite::Result<i64> {
        self.insert_row(args).map_err(TgError::into_module_error)
    }

    fn update(&mut self, args: &Values<'_>) -> rusqlite::Result<()> {
        let old_id: i64 = args.get(0)?;
        self.update_row(old_id, args)
            .map_err(TgError::into_module_error)
    }
}

/// Row copied out of the shadow table.
#[derive(Debug)]
struct StoredRow {
    id: i64,
    shape: Vec<u8>,
    aux: Vec<Value>,
}

/// Where the cursor finds its next row id.
enum Ids {
    /// Keyset pages over every row.
    Table {
        page: VecDeque<i64>,
        after: Option<i64>,
        exhausted: bool,
    },
    /// Rows whose box overlaps the query.
    Candidates(std::vec::IntoIter<i64>),
    Done,
}

/// Exact test applied to each candidate row.
struct Window {
    predicate: Predicate,
    query: Geom,
}

/// Cursor over the rows selected by one filter call.
///
/// Only ids are listed up front. Each row is read and rechecked when the
/// cursor steps onto it.
#[repr(C)]
pub(crate) struct SpatialCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    table: &'vtab SpatialTable,
    ids: Ids,
    window: Option<Window>,
    row: Option<StoredRow>,
    visited: usize,
}

impl SpatialCursor<'_> {
    fn run(&mut self, scan: Scan, args: &Values<'_>) -> Result<()> {
        self.row = None;
        self.window = None;
        self.visited = 0;
        match scan {
            Scan::Full => {
                self.ids = Ids::Table {
                    page: VecDeque::new(),
                    after: None,
                    exhausted: false,
                };
                trace!(table = %self.table.name, "tg0.filter.fullscan");
            }
            Scan::Predicate(predicate) => {
                let query = args
                    .iter()
                    .next()
                    .ok_or_else(|| TgError::value("missing query geometry"))?;
                let query = decode(Input::new(query, 0), &self.table.settings)?;
                let Some(rect) = query.rect() else {
                    self.ids = Ids::Done;
                    return Ok(());
                };
                let candidates = self.table.candidate_ids(rect)?;
                trace!(
                    table = %self.table.name,
                    candidates = candidates.len(),
                    "tg0.filter.predicate"
                );
                self.ids = Ids::Candidates(candidates.into_iter());
                self.window = Some(Window { predicate, query });
            }
        }
        self.advance()
    }

    fn next_id(&mut self) -> Result<Option<i64>> {
        let table = self.table;
        match &mut self.ids {
            Ids::Table {
                page,
                after,
                exhausted,
            } => {
                if page.is_empty() && !*exhausted {
                    let ids = table.id_page(*after)?;
                    *exhausted = ids.len() < PAGE_ROWS;
                    if let Some(&last) = ids.last() {
                        *after = Some(last);
                    }
                    page.extend(ids);
                }
                Ok(page.pop_front())
            }
            Ids::Candidates(ids) => Ok(ids.next()),
            Ids::Done => Ok(None),
        }
    }

    /// Steps onto the next row that passes the window, if any.
    fn advance(&mut self) -> Result<()> {
        self.row = None;
        while let Some(id) = self.next_id()? {
            let Some(row) = self.table.load(id)? else {
                continue;
            };
            self.visited += 1;
            if let Some(window) = &self.window {
                let shape = wkb::parse(&row.shape)?.indexed(&self.table.settings);
                if !window.predicate.evaluate(&shape, &window.query) {
                    continue;
                }
            }
            self.row = Some(row);
            return Ok(());
        }
        self.ids = Ids::Done;
        trace!(table = %self.table.name, visited = self.visited, "tg0.scan.done");
        Ok(())
    }
}

unsafe impl VTabCursor for SpatialCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        Scan::decode(idx_num, idx_str)
            .and_then(|scan| self.run(scan, args))
            .map_err(TgError::into_module_error)
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.advance().map_err(TgError::into_module_error)
    }

    fn eof(&self) -> bool {
        self.row.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(row) = &self.row else {
            return ctx.set_result(&Null);
        };
        match usize::try_from(i) {
            Ok(0) => ctx.set_result(&row.shape),
            Ok(n) => match row.aux.get(n - 1) {
                Some(value) => ctx.set_result(value),
                None => ctx.set_result(&Null),
            },
            Err(_) => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row.as_ref().map_or(0, |row| row.id))
    }
}
