//! Geometry for SQLite.
//!
//! `sqlite-tg` adds geometry values to SQLite connections: WKT, WKB, and
//! GeoJSON codecs, spatial predicates such as `tg_intersects`, aggregates
//! that build multi-geometries, table functions that decompose them, and the
//! `tg0` virtual table, a spatial index kept in an R-tree.
//!
//! ```no_run
//! use rusqlite::Connection;
//!
//! # fn main() -> sqlite_tg::Result<()> {
//! let conn = Connection::open_in_memory()?;
//! sqlite_tg::register(&conn)?;
//! let hit: bool = conn.query_row(
//!     "select tg_intersects('POINT(1 1)', 'POLYGON((0 0, 2 0, 2 2, 0 2, 0 0))')",
//!     [],
//!     |row| row.get(0),
//! )?;
//! assert!(hit);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod each;
pub mod error;
pub mod geom;
pub mod plan;
pub mod predicate;
pub mod sqlite;

pub use codec::{Encoded, Format};
pub use config::{IndexKind, TgOptions};
pub use error::{Result, TgError};
pub use geom::{Coord, Geom, GeomType, Geometry, Rect};
pub use predicate::Predicate;
pub use sqlite::Registry;

use rusqlite::Connection;

/// Registers every function and module on `conn` with default options.
pub fn register(conn: &Connection) -> Result<()> {
    Registry::default().register(conn)
}

/// Registers every function and module on `conn` with `options`.
pub fn register_with(conn: &Connection, options: TgOptions) -> Result<()> {
    Registry::new(options).register(conn)
}
