#![allow(unsafe_code)]
//! Eponymous table functions: `tg_points_each` and friends, and `tg_bbox`.
//!
//! Each table declares its output columns followed by a hidden `source`
//! column; `SELECT * FROM tg_points_each(?)` binds the argument to `source`.

use std::marker::PhantomData;
use std::os::raw::c_int;

use rusqlite::ffi;
use rusqlite::types::{Null, ValueRef};
use rusqlite::vtab::{
    Context, IndexConstraintOp, IndexInfo, VTab, VTabConfig, VTabConnection, VTabCursor, Values,
};
use tracing::trace;

use super::value::{decode, to_tagged, Input};
use crate::each::{BboxCursor, Decompose, MemberCursor};
use crate::error::{Result, TgError};
use crate::geom::{Geom, IndexSettings};

/// Configuration handed to a registered `*_each` function.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EachAux {
    pub(crate) kind: Decompose,
    pub(crate) settings: IndexSettings,
}

const BBOX_SOURCE: c_int = 4;
const EACH_SOURCE: c_int = 1;

/// Accepts only plans that bind the hidden `source` column by equality.
fn plan_source(info: &mut IndexInfo, source: c_int) -> rusqlite::Result<()> {
    let mut has_source = false;
    for (constraint, mut usage) in info.constraints_and_usages() {
        if constraint.column() != source {
            continue;
        }
        let eq = constraint.operator() == IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ;
        if (!has_source && !constraint.is_usable()) || !eq {
            return Err(rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_CONSTRAINT),
                None,
            ));
        }
        has_source = true;
        usage.set_argv_index(1);
        usage.set_omit(true);
    }
    if !has_source {
        return Err(rusqlite::Error::ModuleError(
            "source argument is required".to_owned(),
        ));
    }
    info.set_idx_num(1);
    info.set_estimated_cost(10.0);
    info.set_estimated_rows(10);
    Ok(())
}

/// Parses the source argument; NULL produces no rows.
fn source(args: &Values<'_>, settings: &IndexSettings) -> Result<Option<Geom>> {
    match args.iter().next() {
        None | Some(ValueRef::Null) => Ok(None),
        Some(value) => decode(Input::new(value, 0), settings).map(Some),
    }
}

/// `tg_points_each`, `tg_lines_each`, `tg_polygons_each`, `tg_holes_each`,
/// `tg_geometries_each`, and `tg_each`.
#[repr(C)]
pub(crate) struct EachTable {
    base: ffi::sqlite3_vtab,
    aux: EachAux,
}

unsafe impl<'vtab> VTab<'vtab> for EachTable {
    type Aux = EachAux;
    type Cursor = EachCursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        aux: Option<&EachAux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let aux = *aux.ok_or_else(|| {
            rusqlite::Error::ModuleError("table function registered without a member kind".into())
        })?;
        db.config(VTabConfig::Innocuous)?;
        let schema = format!("CREATE TABLE x({}, source hidden)", aux.kind.column());
        Ok((
            schema,
            EachTable {
                base: ffi::sqlite3_vtab::default(),
                aux,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        plan_source(info, EACH_SOURCE)
    }

    fn open(&'vtab mut self) -> rusqlite::Result<EachCursor<'vtab>> {
        Ok(EachCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            settings: self.aux.settings,
            members: MemberCursor::new(self.aux.kind),
            phantom: PhantomData,
        })
    }
}

/// Cursor over the members of one source geometry.
#[repr(C)]
pub(crate) struct EachCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    settings: IndexSettings,
    members: MemberCursor,
    phantom: PhantomData<&'vtab EachTable>,
}

unsafe impl VTabCursor for EachCursor<'_> {
    fn filter(
        &mut self,
        _idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let geom = source(args, &self.settings).map_err(TgError::into_module_error)?;
        self.members.reset(geom.map(Geom::into_shape));
        trace!(eof = self.members.eof(), "each.filter");
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.members.advance();
        Ok(())
    }

    fn eof(&self) -> bool {
        self.members.eof()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        match i {
            0 => ctx.set_result(
                &self
                    .members
                    .current()
                    .map(|member| to_tagged(&Geom::new(member))),
            ),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.members.position() as i64)
    }
}

/// `tg_bbox(geom)`: one row with the bounding box of the source.
#[repr(C)]
pub(crate) struct BboxTable {
    base: ffi::sqlite3_vtab,
    settings: IndexSettings,
}

unsafe impl<'vtab> VTab<'vtab> for BboxTable {
    type Aux = IndexSettings;
    type Cursor = BboxTableCursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        aux: Option<&IndexSettings>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        db.config(VTabConfig::Innocuous)?;
        Ok((
            "CREATE TABLE x(minX, maxX, minY, maxY, source hidden)".to_owned(),
            BboxTable {
                base: ffi::sqlite3_vtab::default(),
                settings: aux.copied().unwrap_or_default(),
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        plan_source(info, BBOX_SOURCE)
    }

    fn open(&'vtab mut self) -> rusqlite::Result<BboxTableCursor<'vtab>> {
        Ok(BboxTableCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            settings: self.settings,
            bbox: BboxCursor::default(),
            phantom: PhantomData,
        })
    }
}

/// Single-row cursor of `tg_bbox`.
#[repr(C)]
pub(crate) struct BboxTableCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    settings: IndexSettings,
    bbox: BboxCursor,
    phantom: PhantomData<&'vtab BboxTable>,
}

unsafe impl VTabCursor for BboxTableCursor<'_> {
    fn filter(
        &mut self,
        _idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let geom = source(args, &self.settings).map_err(TgError::into_module_error)?;
        let rect = geom.as_ref().and_then(Geom::rect);
        self.bbox.reset(rect, geom.is_some());
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.bbox.advance();
        Ok(())
    }

    fn eof(&self) -> bool {
        self.bbox.eof()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        match usize::try_from(i) {
            Ok(col) if i < BBOX_SOURCE => ctx.set_result(&self.bbox.column(col)),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(0)
    }
}
