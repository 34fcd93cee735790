//! Segment indexes for polygon rings.
//!
//! Both index kinds answer the same question: which segments of a ring may
//! touch a query rectangle. Callers always re-test the candidates exactly, so
//! an index only has to be conservative.

use super::{Coord, Rect, Ring};
use crate::config::{IndexKind, TgOptions};

/// Parameters controlling ring index construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexSettings {
    /// Index kind to build.
    pub kind: IndexKind,
    /// Segments per natural-index leaf and children per inner node.
    pub spread: usize,
    /// Rings with fewer points are left unindexed.
    pub min_points: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings::from(&TgOptions::default())
    }
}

impl From<&TgOptions> for IndexSettings {
    fn from(opts: &TgOptions) -> Self {
        Self {
            kind: opts.default_index,
            spread: opts.index_spread.max(2),
            min_points: opts.index_min_points,
        }
    }
}

impl IndexSettings {
    /// Same settings with a different index kind.
    pub fn with_kind(self, kind: IndexKind) -> Self {
        Self { kind, ..self }
    }
}

/// Built segment index for one ring.
#[derive(Clone, Debug)]
pub enum RingIndex {
    /// Levels of rectangles; level 0 covers runs of `spread` segments and every
    /// higher level covers `spread` rectangles of the level below.
    Natural {
        /// Fan-out of every node.
        spread: usize,
        /// Rectangles per level, leaves first.
        levels: Vec<Vec<Rect>>,
    },
    /// Horizontal stripes listing the segments crossing them.
    YStripes {
        /// Bottom of the first stripe.
        min_y: f64,
        /// Height of every stripe.
        height: f64,
        /// Segment numbers per stripe, ascending.
        stripes: Vec<Vec<u32>>,
    },
}

impl RingIndex {
    pub(crate) fn build(ring: &Ring, settings: &IndexSettings) -> Option<Self> {
        if ring.points().len() < settings.min_points.max(4) {
            return None;
        }
        match settings.kind {
            IndexKind::None => None,
            IndexKind::Natural => Some(build_natural(ring, settings.spread.max(2))),
            IndexKind::YStripes => build_ystripes(ring),
        }
    }

    pub(crate) fn search<F>(&self, ring: &Ring, query: &Rect, f: &mut F)
    where
        F: FnMut(usize, Coord, Coord) -> bool,
    {
        match self {
            RingIndex::Natural { spread, levels } => {
                if let Some(top) = levels.len().checked_sub(1) {
                    for node in 0..levels[top].len() {
                        if !search_natural(ring, *spread, levels, top, node, query, f) {
                            return;
                        }
                    }
                }
            }
            RingIndex::YStripes {
                min_y,
                height,
                stripes,
            } => {
                if query.max.y < *min_y {
                    return;
                }
                let last = stripes.len().saturating_sub(1);
                let lo = stripe_of(query.min.y, *min_y, *height, last);
                let hi = stripe_of(query.max.y, *min_y, *height, last);
                let mut seen: Vec<u32> = Vec::new();
                for stripe in &stripes[lo..=hi] {
                    seen.extend_from_slice(stripe);
                }
                seen.sort_unstable();
                seen.dedup();
                for i in seen {
                    let i = i as usize;
                    let (a, b) = ring.segment(i);
                    if Rect::of_segment(a, b).intersects(query) && !f(i, a, b) {
                        return;
                    }
                }
            }
        }
    }
}

fn build_natural(ring: &Ring, spread: usize) -> RingIndex {
    let nsegs = ring.num_segments();
    let mut leaves = Vec::with_capacity(nsegs.div_ceil(spread));
    let mut start = 0;
    while start < nsegs {
        let end = (start + spread).min(nsegs);
        let mut rect = Rect::from_coord(ring.points()[start]);
        for c in &ring.points()[start + 1..=end] {
            rect.expand_coord(*c);
        }
        leaves.push(rect);
        start = end;
    }
    let mut levels = vec![leaves];
    while levels.last().map_or(0, Vec::len) > spread {
        let below = levels.last().map(Vec::as_slice).unwrap_or_default();
        let upper: Vec<Rect> = below
            .chunks(spread)
            .map(|chunk| chunk.iter().skip(1).fold(chunk[0], |acc, r| acc.union(*r)))
            .collect();
        levels.push(upper);
    }
    RingIndex::Natural { spread, levels }
}

fn search_natural<F>(
    ring: &Ring,
    spread: usize,
    levels: &[Vec<Rect>],
    level: usize,
    node: usize,
    query: &Rect,
    f: &mut F,
) -> bool
where
    F: FnMut(usize, Coord, Coord) -> bool,
{
    if !levels[level][node].intersects(query) {
        return true;
    }
    let first = node * spread;
    if level == 0 {
        let last = (first + spread).min(ring.num_segments());
        for i in first..last {
            let (a, b) = ring.segment(i);
            if Rect::of_segment(a, b).intersects(query) && !f(i, a, b) {
                return false;
            }
        }
        return true;
    }
    let last = (first + spread).min(levels[level - 1].len());
    for child in first..last {
        if !search_natural(ring, spread, levels, level - 1, child, query, f) {
            return false;
        }
    }
    true
}

fn build_ystripes(ring: &Ring) -> Option<RingIndex> {
    let rect = ring.rect()?;
    let nsegs = ring.num_segments();
    let count = (nsegs / 4).max(1);
    let span = rect.max.y - rect.min.y;
    if span <= 0.0 {
        return None;
    }
    let height = span / count as f64;
    let last = count - 1;
    let mut stripes = vec![Vec::new(); count];
    for i in 0..nsegs {
        let (a, b) = ring.segment(i);
        let lo = stripe_of(a.y.min(b.y), rect.min.y, height, last);
        let hi = stripe_of(a.y.max(b.y), rect.min.y, height, last);
        for stripe in &mut stripes[lo..=hi] {
            stripe.push(i as u32);
        }
    }
    Some(RingIndex::YStripes {
        min_y: rect.min.y,
        height,
        stripes,
    })
}

fn stripe_of(y: f64, min_y: f64, height: f64, last: usize) -> usize {
    let pos = ((y - min_y) / height).floor();
    if pos.is_nan() || pos < 0.0 {
        0
    } else {
        (pos as usize).min(last)
    }
}
