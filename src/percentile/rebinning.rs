//! The rebinning index: a coarser, smaller structure than the conversion
//! index, used only by `LOW_MEMORY` mode. Deliberately over-inclusive
//! (recall-biased) so that the exact result is always a subset of what
//! this index returns.

use crate::percentile::conversion::ConversionIndex;
use crate::dsl::ast::Cmp;
use crate::ids::HistId;
use crate::percentile::histogram::Histogram;
use roaring::RoaringBitmap;

/// A coarser-grained [`ConversionIndex`]: same grid mechanics, a larger
/// `step_size` so the structure is cheaper to build and hold, and search
/// always runs in the recall-biased direction — never precision, since
/// this index backs only the one mode and isn't caller-selectable.
#[derive(Debug, Clone)]
pub struct RebinningIndex {
    inner: ConversionIndex,
}

impl RebinningIndex {
    /// `step_size` should be coarser (larger) than the conversion index's,
    /// e.g. the default `0.1` against a conversion default of `0.01`.
    pub fn build(histograms: &hashbrown::HashMap<HistId, Histogram>, step_size: f64) -> Self {
        Self {
            inner: ConversionIndex::build(histograms, step_size),
        }
    }

    pub fn search(&self, p: f64, cmp: Cmp, reference: f64) -> RoaringBitmap {
        self.inner.search_approx(p, cmp, reference, true)
    }
}
