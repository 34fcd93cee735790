#![allow(unsafe_code)]
//! Raw module registration for `tg0`.
//!
//! rusqlite generates the create, connect, cursor and update callbacks. The
//! module table is copied once and extended with the callbacks rusqlite does
//! not expose: `xFindFunction` routes `tg_intersects(_shape, ?)` and friends
//! to the table's planner, `xShadowName` protects the R-tree tables and
//! `xRename` refuses renames the shadow table could not follow.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use rusqlite::vtab::{update_module, Module};
use rusqlite::{ffi, Connection};
use tracing::trace;

use super::tg0::{Overload, SpatialTable, SHADOW_SUFFIXES};
use super::value::{decode, Input, JSON_SUBTYPE};
use crate::config::TgOptions;
use crate::error::{Result, TgError};
use crate::plan;
use crate::predicate::Predicate;

type ScalarFn = unsafe extern "C" fn(*mut ffi::sqlite3_context, c_int, *mut *mut ffi::sqlite3_value);

static MODULE: OnceLock<ffi::sqlite3_module> = OnceLock::new();

fn module() -> &'static ffi::sqlite3_module {
    MODULE.get_or_init(|| {
        let generated: &'static Module<'static, SpatialTable> = update_module::<SpatialTable>();
        // `Module` is a transparent wrapper over the raw module table.
        let mut raw = unsafe {
            std::ptr::read((generated as *const Module<'static, SpatialTable>).cast::<ffi::sqlite3_module>())
        };
        raw.iVersion = 3;
        raw.xFindFunction = Some(find_function);
        raw.xRename = Some(rename);
        raw.xShadowName = Some(shadow_name);
        raw
    })
}

/// Registers `tg0` on `conn` with `options` as its client data.
pub(crate) fn register(conn: &Connection, name: &str, options: TgOptions) -> Result<()> {
    let c_name = CString::new(name).map_err(|_| TgError::value("module name contains NUL"))?;
    let aux = Box::into_raw(Box::new(options));
    // SQLite takes ownership of `aux` and calls `drop_options` even on failure.
    let rc = unsafe {
        ffi::sqlite3_create_module_v2(
            conn.handle(),
            c_name.as_ptr(),
            module(),
            aux.cast::<c_void>(),
            Some(drop_options),
        )
    };
    if rc != ffi::SQLITE_OK {
        return Err(TgError::Sqlite(rusqlite::Error::SqliteFailure(
            ffi::Error::new(rc),
            Some(format!("failed to register module {name}")),
        )));
    }
    Ok(())
}

unsafe extern "C" fn drop_options(p: *mut c_void) {
    if !p.is_null() {
        drop(Box::from_raw(p.cast::<TgOptions>()));
    }
}

unsafe extern "C" fn find_function(
    vtab: *mut ffi::sqlite3_vtab,
    n_arg: c_int,
    name: *const c_char,
    x_func: *mut Option<ScalarFn>,
    pp_arg: *mut *mut c_void,
) -> c_int {
    if n_arg != 2 || vtab.is_null() || name.is_null() {
        return 0;
    }
    let Some(predicate) = CStr::from_ptr(name)
        .to_str()
        .ok()
        .and_then(Predicate::from_function_name)
    else {
        return 0;
    };
    // `sqlite3_vtab` is the first field of the `repr(C)` table.
    let table = &*vtab.cast::<SpatialTable>();
    let Some(overload) = table.overload(predicate) else {
        return 0;
    };
    *x_func = Some(call_predicate);
    *pp_arg = (overload as *const Overload).cast_mut().cast::<c_void>();
    trace!(predicate = predicate.name(), "tg0.find_function");
    plan::constraint_code(predicate)
}

unsafe extern "C" fn call_predicate(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    let overload = ffi::sqlite3_user_data(ctx).cast::<Overload>();
    if overload.is_null() || argc != 2 || argv.is_null() {
        report(ctx, "tg0 predicate called with bad arguments");
        return;
    }
    let overload = *overload;
    let a = raw_input(*argv);
    let b = raw_input(*argv.add(1));
    let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<bool> {
        let a = decode(a, &overload.settings)?;
        let b = decode(b, &overload.settings)?;
        Ok(overload.predicate.evaluate(&a, &b))
    }));
    match outcome {
        Ok(Ok(hit)) => ffi::sqlite3_result_int(ctx, c_int::from(hit)),
        Ok(Err(err)) => report(ctx, &err.to_string()),
        Err(_) => report(ctx, "tg0 predicate panicked"),
    }
}

unsafe fn report(ctx: *mut ffi::sqlite3_context, msg: &str) {
    let len = c_int::try_from(msg.len()).unwrap_or(c_int::MAX);
    ffi::sqlite3_result_error(ctx, msg.as_ptr().cast::<c_char>(), len);
}

/// Borrows a raw argument for the duration of the call.
unsafe fn raw_input<'a>(value: *mut ffi::sqlite3_value) -> Input<'a> {
    match ffi::sqlite3_value_type(value) {
        ffi::SQLITE_TEXT => {
            let text = ffi::sqlite3_value_text(value);
            let len = usize::try_from(ffi::sqlite3_value_bytes(value)).unwrap_or(0);
            let bytes = if text.is_null() {
                &[][..]
            } else {
                std::slice::from_raw_parts(text, len)
            };
            Input::Text {
                bytes,
                json: ffi::sqlite3_value_subtype(value) == JSON_SUBTYPE,
            }
        }
        ffi::SQLITE_BLOB => {
            let blob = ffi::sqlite3_value_blob(value);
            let len = usize::try_from(ffi::sqlite3_value_bytes(value)).unwrap_or(0);
            if blob.is_null() {
                Input::Blob(&[])
            } else {
                Input::Blob(std::slice::from_raw_parts(blob.cast::<u8>(), len))
            }
        }
        _ => Input::Other,
    }
}

unsafe extern "C" fn shadow_name(name: *const c_char) -> c_int {
    if name.is_null() {
        return 0;
    }
    let name = CStr::from_ptr(name).to_bytes();
    c_int::from(
        SHADOW_SUFFIXES
            .iter()
            .any(|suffix| suffix.as_bytes().eq_ignore_ascii_case(name)),
    )
}

unsafe extern "C" fn rename(vtab: *mut ffi::sqlite3_vtab, _new: *const c_char) -> c_int {
    if !vtab.is_null() {
        let vtab = &mut *vtab;
        if !vtab.zErrMsg.is_null() {
            ffi::sqlite3_free(vtab.zErrMsg.cast::<c_void>());
        }
        vtab.zErrMsg = ffi::sqlite3_mprintf(
            c"%s".as_ptr(),
            c"tg0 tables cannot be renamed; create a new table and copy the rows".as_ptr(),
        );
    }
    ffi::SQLITE_ERROR
}
