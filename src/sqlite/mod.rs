//! SQL surface: scalar and aggregate functions, table functions, and `tg0`.
//!
//! Everything is installed per connection through [`Registry`].

mod aggregate;
mod each;
mod functions;
mod overload;
mod tg0;
pub mod value;

use rusqlite::vtab::eponymous_only_module;
use rusqlite::Connection;
use tracing::debug;

pub use aggregate::{Group, AGGREGATES};
pub use functions::{debug_text, version, Scalar, SCALARS};

use self::each::{BboxTable, EachAux, EachTable};
use crate::config::TgOptions;
use crate::each::Decompose;
use crate::error::Result;
use crate::geom::IndexSettings;

/// Name of the bounding-box table function.
pub const BBOX_FUNCTION: &str = "tg_bbox";

/// Name of the spatial index module.
pub const TG0_MODULE: &str = "tg0";

/// Installs the extension on connections.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    options: TgOptions,
}

impl Registry {
    /// Registry applying `options` to every geometry it parses.
    pub fn new(options: TgOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &TgOptions {
        &self.options
    }

    /// Distinct names of the scalar and aggregate functions.
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = SCALARS
            .iter()
            .map(|(name, _, _)| *name)
            .chain(AGGREGATES.iter().map(|(name, _, _)| *name))
            .collect();
        names.dedup();
        names
    }

    /// Names of the table-valued functions and virtual table modules.
    pub fn module_names(&self) -> Vec<&'static str> {
        Decompose::FUNCTIONS
            .iter()
            .map(|(name, _)| *name)
            .chain([BBOX_FUNCTION, TG0_MODULE])
            .collect()
    }

    /// Registers every function and module on `conn`.
    pub fn register(&self, conn: &Connection) -> Result<()> {
        self.options.validate()?;
        let settings = IndexSettings::from(&self.options);

        for (name, n_arg, scalar) in SCALARS {
            functions::register(conn, name, n_arg, scalar, &self.options)?;
        }
        for (name, n_arg, group) in AGGREGATES {
            aggregate::register(conn, name, n_arg, group, &self.options)?;
        }
        for (name, kind) in Decompose::FUNCTIONS {
            conn.create_module(
                name,
                eponymous_only_module::<EachTable>(),
                Some(EachAux { kind, settings }),
            )?;
        }
        conn.create_module(
            BBOX_FUNCTION,
            eponymous_only_module::<BboxTable>(),
            Some(settings),
        )?;
        overload::register(conn, TG0_MODULE, self.options.clone())?;

        debug!(
            functions = SCALARS.len() + AGGREGATES.len(),
            modules = Decompose::FUNCTIONS.len() + 2,
            default_index = self.options.default_index.name(),
            "tg.register.completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let registry = Registry::default();
        let functions = registry.function_names();
        let mut sorted = functions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), functions.len());
        assert!(functions.contains(&"tg_intersects"));
        assert!(functions.contains(&"tg_group_feature_collection_geojson"));
        assert_eq!(registry.module_names().len(), 8);
    }

    #[test]
    fn register_rejects_bad_options() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = Registry::new(TgOptions {
            index_spread: 0,
            ..TgOptions::default()
        });
        assert!(registry.register(&conn).is_err());
    }

    #[test]
    fn register_installs_version() {
        let conn = Connection::open_in_memory().unwrap();
        Registry::default().register(&conn).unwrap();
        let v: String = conn
            .query_row("select tg_version()", [], |row| row.get(0))
            .unwrap();
        assert_eq!(v, version());
    }
}
