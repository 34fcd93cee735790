//! Query-plan negotiation for the `tg0` table.
//!
//! The planner offers constraints; at most one recognised predicate on the
//! `_shape` column may be among the usable ones, and only predicates marked
//! [`Pushdown::Indexed`] in [`PUSHDOWN`] can be answered through the R-tree.

use crate::config::TgOptions;
use crate::error::{Result, TgError};
use crate::predicate::Predicate;

/// Column number of `_shape` in the declared table.
pub const SHAPE_COLUMN: i32 = 0;

/// Constraint code reported for [`Predicate::Intersects`]; the others follow
/// in [`Predicate::ALL`] order.
pub const FIRST_CONSTRAINT_CODE: i32 = 150;

/// Index string of the predicate plan.
pub const PREDICATE_PLAN: &str = "predicate";

/// Index string of the full-scan plan.
pub const FULLSCAN_PLAN: &str = "fullscan";

/// How a predicate can be served by the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pushdown {
    /// Range-scan the R-tree with the query box, then recheck exactly.
    Indexed,
    /// Rejected at plan time.
    Unsupported,
}

/// Pushdown support per predicate.
pub const PUSHDOWN: [(Predicate, Pushdown); 7] = [
    (Predicate::Intersects, Pushdown::Indexed),
    (Predicate::Disjoint, Pushdown::Unsupported),
    (Predicate::Contains, Pushdown::Unsupported),
    (Predicate::Within, Pushdown::Unsupported),
    (Predicate::Covers, Pushdown::Unsupported),
    (Predicate::CoveredBy, Pushdown::Unsupported),
    (Predicate::Touches, Pushdown::Unsupported),
];

/// Looks up a predicate's pushdown support.
pub fn pushdown(predicate: Predicate) -> Pushdown {
    PUSHDOWN
        .iter()
        .find(|(p, _)| *p == predicate)
        .map_or(Pushdown::Unsupported, |(_, support)| *support)
}

/// Constraint code reported through function overloading.
pub fn constraint_code(predicate: Predicate) -> i32 {
    let ordinal = Predicate::ALL
        .iter()
        .position(|p| *p == predicate)
        .unwrap_or_default();
    FIRST_CONSTRAINT_CODE + ordinal as i32
}

/// Inverse of [`constraint_code`].
pub fn predicate_for_code(code: i32) -> Option<Predicate> {
    let ordinal = usize::try_from(code.checked_sub(FIRST_CONSTRAINT_CODE)?).ok()?;
    Predicate::ALL.get(ordinal).copied()
}

/// One constraint offered by the planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offer {
    /// Constrained column.
    pub column: i32,
    /// Overloaded-function code, `None` for ordinary operators.
    pub function: Option<i32>,
    /// Whether the right-hand side is available to this plan.
    pub usable: bool,
}

/// Chosen access path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Visit every row.
    FullScan,
    /// Answer `predicate` from the offer at index `offer`, whose value is passed
    /// as the first filter argument.
    Predicate {
        /// Predicate being pushed down.
        predicate: Predicate,
        /// Position of the constraint in the offer list.
        offer: usize,
    },
}

impl Plan {
    /// Index number reported to the planner.
    pub fn idx_num(&self) -> i32 {
        match self {
            Plan::FullScan => 0,
            Plan::Predicate { predicate, .. } => constraint_code(*predicate),
        }
    }

    /// Index string reported to the planner.
    pub fn idx_str(&self) -> &'static str {
        match self {
            Plan::FullScan => FULLSCAN_PLAN,
            Plan::Predicate { .. } => PREDICATE_PLAN,
        }
    }

    /// Estimated cost and row count.
    pub fn estimate(&self, opts: &TgOptions) -> (f64, i64) {
        match self {
            Plan::FullScan => (opts.fullscan_cost, opts.fullscan_rows),
            Plan::Predicate { .. } => (opts.predicate_cost, opts.predicate_rows),
        }
    }
}

/// Scan requested by a plan, as seen when the cursor is filtered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scan {
    /// Every row in id order.
    Full,
    /// Rows whose box overlaps the query and that pass the exact predicate.
    Predicate(Predicate),
}

impl Scan {
    /// Decodes the index number and string chosen at plan time.
    pub fn decode(idx_num: i32, idx_str: Option<&str>) -> Result<Self> {
        match idx_str {
            Some(FULLSCAN_PLAN) => Ok(Scan::Full),
            Some(PREDICATE_PLAN) => predicate_for_code(idx_num)
                .map(Scan::Predicate)
                .ok_or_else(|| TgError::value(format!("unknown query plan {idx_num}"))),
            other => Err(TgError::value(format!("unknown idxStr {other:?}"))),
        }
    }
}

/// Picks the access path for the offered constraints.
pub fn negotiate(offers: &[Offer]) -> Result<Plan> {
    let mut chosen: Option<(usize, Predicate)> = None;
    for (i, offer) in offers.iter().enumerate() {
        if !offer.usable || offer.column != SHAPE_COLUMN {
            continue;
        }
        let Some(predicate) = offer.function.and_then(predicate_for_code) else {
            continue;
        };
        if chosen.is_some() {
            return Err(TgError::unsupported(
                "only 1 predicate is allowed on tg0 WHERE clauses.",
            ));
        }
        chosen = Some((i, predicate));
    }
    match chosen {
        None => Ok(Plan::FullScan),
        Some((offer, predicate)) => match pushdown(predicate) {
            Pushdown::Indexed => Ok(Plan::Predicate { predicate, offer }),
            Pushdown::Unsupported => Err(TgError::unsupported(format!(
                "The given predicate inside the WHERE clause on tg0 table is not supported yet for pushdown: {}()",
                predicate.function_name()
            ))),
        },
    }
}
