use serde::{Deserialize, Serialize};

use crate::error::{Result, TgError};

/// Segment index built for polygon rings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// No index; every ring query walks all segments.
    None,
    /// Fixed-size runs of consecutive segments grouped under a bounding rectangle.
    #[default]
    Natural,
    /// Segments bucketed into horizontal stripes.
    YStripes,
}

impl IndexKind {
    /// Parses the option names accepted by `tg_geom(text, index)`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Ok(IndexKind::None),
            "natural" => Ok(IndexKind::Natural),
            "ystripes" => Ok(IndexKind::YStripes),
            _ => Err(TgError::value(
                "unrecognized index option. Should be one of none/natural/ystripes",
            )),
        }
    }

    /// Option name, the inverse of [`IndexKind::parse`].
    pub fn name(self) -> &'static str {
        match self {
            IndexKind::None => "none",
            IndexKind::Natural => "natural",
            IndexKind::YStripes => "ystripes",
        }
    }

    pub(crate) fn to_bits(self) -> u8 {
        match self {
            IndexKind::None => 0,
            IndexKind::Natural => 1,
            IndexKind::YStripes => 2,
        }
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => IndexKind::Natural,
            2 => IndexKind::YStripes,
            _ => IndexKind::None,
        }
    }
}

/// Options applied when registering the extension on a connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TgOptions {
    /// Index kind used when a geometry is parsed without an explicit choice.
    pub default_index: IndexKind,
    /// Number of segments summarized by one natural index leaf.
    pub index_spread: usize,
    /// Rings with fewer points than this are never indexed.
    pub index_min_points: usize,
    /// Estimated cost reported to the planner for a pushed-down predicate.
    pub predicate_cost: f64,
    /// Estimated rows reported to the planner for a pushed-down predicate.
    pub predicate_rows: i64,
    /// Estimated cost reported to the planner for a full scan of a tg0 table.
    pub fullscan_cost: f64,
    /// Estimated rows reported to the planner for a full scan of a tg0 table.
    pub fullscan_rows: i64,
}

impl Default for TgOptions {
    fn default() -> Self {
        Self {
            default_index: IndexKind::Natural,
            index_spread: 16,
            index_min_points: 32,
            predicate_cost: 30.0,
            predicate_rows: 10,
            fullscan_cost: 3_000_000.0,
            fullscan_rows: 100_000,
        }
    }
}

impl TgOptions {
    /// Options that never build ring indexes, useful for small geometries.
    pub fn unindexed() -> Self {
        Self {
            default_index: IndexKind::None,
            ..Self::default()
        }
    }

    /// Options tuned for large polygons with many point-in-polygon checks.
    pub fn large_polygons() -> Self {
        Self {
            default_index: IndexKind::YStripes,
            index_min_points: 16,
            ..Self::default()
        }
    }

    /// Loads options from a JSON object; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let opts: TgOptions = serde_json::from_str(text)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Checks that the option values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.index_spread < 2 {
            return Err(TgError::value("index_spread must be at least 2"));
        }
        if !(self.predicate_cost.is_finite() && self.fullscan_cost.is_finite()) {
            return Err(TgError::value("planner costs must be finite"));
        }
        if self.predicate_rows < 0 || self.fullscan_rows < 0 {
            return Err(TgError::value("planner row estimates must not be negative"));
        }
        Ok(())
    }
}
