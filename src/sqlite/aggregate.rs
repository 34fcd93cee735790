//! Aggregate SQL functions.
//!
//! State lives in the accumulator SQLite hands to each step, so concurrent
//! groups and separate statements never share anything.

use rusqlite::functions::{Aggregate, Context, FunctionFlags, SubType};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::value::{geom_arg_uncached, to_tagged, JSON_SUBTYPE};
use crate::codec::{geojson::FeatureCollectionWriter, looks_like_json};
use crate::config::TgOptions;
use crate::error::{Result, TgError};
use crate::geom::build::{BboxBuilder, CollectionBuilder, MultiPointBuilder, MultiPolygonBuilder};
use crate::geom::IndexSettings;

/// One aggregate body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Group {
    /// `tg_group_multipoint(point)`
    MultiPoint,
    /// `tg_group_multipolygon(polygon)`
    MultiPolygon,
    /// `tg_group_bbox(geom)`
    Bbox,
    /// `tg_group_geometry_collection(geom)`
    GeometryCollection,
    /// `tg_group_feature_collection_geojson(geom[, properties])`
    FeatureCollection,
}

/// Every aggregate as `(name, argument count, body)`.
pub const AGGREGATES: [(&str, i32, Group); 6] = [
    ("tg_group_multipoint", 1, Group::MultiPoint),
    ("tg_group_multipolygon", 1, Group::MultiPolygon),
    ("tg_group_bbox", 1, Group::Bbox),
    ("tg_group_geometry_collection", 1, Group::GeometryCollection),
    ("tg_group_feature_collection_geojson", 1, Group::FeatureCollection),
    ("tg_group_feature_collection_geojson", 2, Group::FeatureCollection),
];

/// Registers one aggregate under `name`.
pub(crate) fn register(
    conn: &Connection,
    name: &str,
    n_arg: i32,
    group: Group,
    opts: &TgOptions,
) -> Result<()> {
    let settings = IndexSettings::from(opts);
    let flags =
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_INNOCUOUS | FunctionFlags::SQLITE_SUBTYPE;
    match group {
        Group::MultiPoint => {
            conn.create_aggregate_function(name, n_arg, flags, GroupMultiPoint(settings))?
        }
        Group::MultiPolygon => {
            conn.create_aggregate_function(name, n_arg, flags, GroupMultiPolygon(settings))?
        }
        Group::Bbox => conn.create_aggregate_function(name, n_arg, flags, GroupBbox(settings))?,
        Group::GeometryCollection => {
            conn.create_aggregate_function(name, n_arg, flags, GroupCollection(settings))?
        }
        Group::FeatureCollection => conn.create_aggregate_function(
            name,
            n_arg,
            flags | FunctionFlags::SQLITE_RESULT_SUBTYPE,
            GroupFeatures(settings),
        )?,
    }
    Ok(())
}

struct GroupMultiPoint(IndexSettings);

impl Aggregate<MultiPointBuilder, Vec<u8>> for GroupMultiPoint {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<MultiPointBuilder> {
        Ok(MultiPointBuilder::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut MultiPointBuilder) -> rusqlite::Result<()> {
        let geom = geom_arg_uncached(ctx, 0, &self.0).map_err(|e| e.into_function_error())?;
        acc.push(&geom).map_err(|e| e.into_function_error())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<MultiPointBuilder>,
    ) -> rusqlite::Result<Vec<u8>> {
        Ok(to_tagged(&acc.unwrap_or_default().finish()))
    }
}

struct GroupMultiPolygon(IndexSettings);

impl Aggregate<MultiPolygonBuilder, Vec<u8>> for GroupMultiPolygon {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<MultiPolygonBuilder> {
        Ok(MultiPolygonBuilder::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut MultiPolygonBuilder) -> rusqlite::Result<()> {
        let geom = geom_arg_uncached(ctx, 0, &self.0).map_err(|e| e.into_function_error())?;
        acc.push(&geom).map_err(|e| e.into_function_error())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<MultiPolygonBuilder>,
    ) -> rusqlite::Result<Vec<u8>> {
        Ok(to_tagged(&acc.unwrap_or_default().finish()))
    }
}

struct GroupBbox(IndexSettings);

impl Aggregate<BboxBuilder, Option<Vec<u8>>> for GroupBbox {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BboxBuilder> {
        Ok(BboxBuilder::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BboxBuilder) -> rusqlite::Result<()> {
        let geom = geom_arg_uncached(ctx, 0, &self.0).map_err(|e| e.into_function_error())?;
        acc.push(&geom);
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BboxBuilder>,
    ) -> rusqlite::Result<Option<Vec<u8>>> {
        Ok(acc.and_then(BboxBuilder::finish).map(|g| to_tagged(&g)))
    }
}

struct GroupCollection(IndexSettings);

impl Aggregate<CollectionBuilder, Vec<u8>> for GroupCollection {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<CollectionBuilder> {
        Ok(CollectionBuilder::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut CollectionBuilder) -> rusqlite::Result<()> {
        let geom = geom_arg_uncached(ctx, 0, &self.0).map_err(|e| e.into_function_error())?;
        acc.push(geom);
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<CollectionBuilder>,
    ) -> rusqlite::Result<Vec<u8>> {
        Ok(to_tagged(&acc.unwrap_or_default().finish()))
    }
}

struct GroupFeatures(IndexSettings);

impl Aggregate<FeatureCollectionWriter, (Option<String>, SubType)> for GroupFeatures {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<FeatureCollectionWriter> {
        Ok(FeatureCollectionWriter::default())
    }

    fn step(
        &self,
        ctx: &mut Context<'_>,
        acc: &mut FeatureCollectionWriter,
    ) -> rusqlite::Result<()> {
        let geom = geom_arg_uncached(ctx, 0, &self.0).map_err(|e| e.into_function_error())?;
        let properties = if ctx.len() > 1 {
            properties(ctx.get_raw(1), ctx.get_subtype(1)).map_err(|e| e.into_function_error())?
        } else {
            None
        };
        acc.push(&geom, properties);
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<FeatureCollectionWriter>,
    ) -> rusqlite::Result<(Option<String>, SubType)> {
        Ok(match acc.and_then(FeatureCollectionWriter::finish) {
            Some(text) => (Some(text), Some(JSON_SUBTYPE)),
            None => (None, None),
        })
    }
}

/// Properties argument when it is JSON text. Text that claims to be JSON
/// but does not parse is a value error.
fn properties(value: ValueRef<'_>, subtype: u32) -> Result<Option<&str>> {
    let text = match value {
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => return Ok(None),
        },
        _ => return Ok(None),
    };
    if subtype != JSON_SUBTYPE && !looks_like_json(text) {
        return Ok(None);
    }
    serde_json::from_str::<serde_json::Value>(text).map_err(|e| {
        TgError::value(format!(
            "properties to tg_group_feature_collection_geojson() must be valid JSON: {e}"
        ))
    })?;
    Ok(Some(text))
}
