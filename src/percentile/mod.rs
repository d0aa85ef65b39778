//! The percentile index. Evaluates percentile predicates over per-column
//! histograms in four accuracy/performance modes, including a
//! persistent-worker-pool parallel exact path.

mod conversion;
mod histogram;
mod pool;
mod rebinning;

pub use conversion::ConversionIndex;
pub use histogram::Histogram;
pub use pool::HistogramPool;
pub use rebinning::RebinningIndex;

use crate::dsl::ast::Cmp;
use crate::error::PercentilePredicateError;
use crate::ids::HistId;
use hashbrown::HashMap;
use roaring::RoaringBitmap;

/// The four percentile-search modes, trading recall/precision guarantees
/// for build and query cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FainderMode {
    LowMemory,
    FullPrecision,
    FullRecall,
    Exact,
}

/// Tunables for building a [`PercentileIndex`]. The bucketing granularity
/// constants are workload-dependent, so they're exposed here rather than
/// hard-coded.
#[derive(Debug, Clone, Copy)]
pub struct PercentileIndexConfig {
    pub conversion_step: f64,
    pub rebinning_step: f64,
    pub parallel: bool,
    pub num_workers: usize,
}

impl Default for PercentileIndexConfig {
    fn default() -> Self {
        Self {
            conversion_step: 0.01,
            rebinning_step: 0.1,
            parallel: true,
            num_workers: 0,
        }
    }
}

/// Owns zero or more of the rebinning index, conversion index, and raw
/// histograms — any subset may be absent, depending on which modes the
/// deployment needs — plus the persistent parallel-exact worker pool.
#[derive(Debug, Default)]
pub struct PercentileIndex {
    rebinning: Option<RebinningIndex>,
    conversion: Option<ConversionIndex>,
    histograms: Option<HashMap<HistId, Histogram>>,
    pool: Option<HistogramPool>,
}

impl PercentileIndex {
    /// Builds an index from whichever of the three backing structures are
    /// available; any subset may be present.
    pub fn build(
        histograms: Option<HashMap<HistId, Histogram>>,
        config: PercentileIndexConfig,
    ) -> Self {
        let conversion = histograms
            .as_ref()
            .map(|h| ConversionIndex::build(h, config.conversion_step));
        let rebinning = histograms
            .as_ref()
            .map(|h| RebinningIndex::build(h, config.rebinning_step));
        let pool = if config.parallel {
            histograms.as_ref().and_then(|h| {
                let ids: Vec<HistId> = h.keys().copied().collect();
                HistogramPool::build(&ids, config.num_workers)
            })
        } else {
            None
        };
        Self {
            rebinning,
            conversion,
            histograms,
            pool,
        }
    }

    /// `search(pctl, cmp, ref, mode, id_filter) -> HistId set`.
    pub fn search(
        &self,
        pctl: f64,
        cmp: Cmp,
        reference: f64,
        mode: FainderMode,
        id_filter: Option<&RoaringBitmap>,
    ) -> Result<RoaringBitmap, PercentilePredicateError> {
        if !(0.0 < pctl && pctl <= 1.0) {
            return Err(PercentilePredicateError::OutOfRange(pctl));
        }

        let result = match mode {
            FainderMode::LowMemory => {
                let rebinning = self
                    .rebinning
                    .as_ref()
                    .ok_or(PercentilePredicateError::IndexNotLoaded { mode })?;
                let mut result = rebinning.search(pctl, cmp, reference);
                if let Some(filter) = id_filter {
                    result &= filter;
                }
                result
            }
            FainderMode::FullPrecision => {
                let conversion = self
                    .conversion
                    .as_ref()
                    .ok_or(PercentilePredicateError::IndexNotLoaded { mode })?;
                let mut result = conversion.search_approx(pctl, cmp, reference, false);
                if let Some(filter) = id_filter {
                    result &= filter;
                }
                result
            }
            FainderMode::FullRecall => {
                let conversion = self
                    .conversion
                    .as_ref()
                    .ok_or(PercentilePredicateError::IndexNotLoaded { mode })?;
                let mut result = conversion.search_approx(pctl, cmp, reference, true);
                if let Some(filter) = id_filter {
                    result &= filter;
                }
                result
            }
            FainderMode::Exact => self.search_exact(pctl, cmp, reference, id_filter)?,
        };

        Ok(result)
    }

    fn search_exact(
        &self,
        pctl: f64,
        cmp: Cmp,
        reference: f64,
        id_filter: Option<&RoaringBitmap>,
    ) -> Result<RoaringBitmap, PercentilePredicateError> {
        let conversion = self
            .conversion
            .as_ref()
            .ok_or(PercentilePredicateError::IndexNotLoaded { mode: FainderMode::Exact })?;
        let histograms = self
            .histograms
            .as_ref()
            .ok_or(PercentilePredicateError::IndexNotLoaded { mode: FainderMode::Exact })?;

        let candidates = conversion.candidates(pctl, cmp, reference);

        // Parallel fan-out only when no filter is supplied and a pool was
        // built; a filter makes the candidate set trivially small, so a
        // serial pass avoids dispatching trivial work.
        match (id_filter, &self.pool) {
            (None, Some(pool)) => Ok(pool.refine(&candidates, histograms, pctl, cmp, reference)),
            (filter, _) => {
                let mut result = RoaringBitmap::new();
                for hist in candidates.iter() {
                    if filter.is_some_and(|f| !f.contains(hist)) {
                        continue;
                    }
                    if histograms.get(&hist).is_some_and(|h| h.satisfies(pctl, cmp, reference)) {
                        result.insert(hist);
                    }
                }
                Ok(result)
            }
        }
    }

    pub fn has_rebinning(&self) -> bool {
        self.rebinning.is_some()
    }

    pub fn has_conversion(&self) -> bool {
        self.conversion.is_some()
    }

    pub fn has_histograms(&self) -> bool {
        self.histograms.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> PercentileIndex {
        let mut hists = HashMap::new();
        hists.insert(0, Histogram::from_counts(vec![10.0, 20.0, 30.0], vec![1, 1, 1]));
        hists.insert(1, Histogram::from_counts(vec![100.0, 200.0, 300.0], vec![1, 1, 1]));
        hists.insert(2, Histogram::from_counts(vec![5.0, 6.0, 7.0], vec![1, 1, 1]));
        PercentileIndex::build(Some(hists), PercentileIndexConfig::default())
    }

    #[test]
    fn rejects_out_of_range_percentile() {
        let idx = fixture();
        let err = idx.search(0.0, Cmp::Ge, 10.0, FainderMode::Exact, None).unwrap_err();
        assert!(matches!(err, PercentilePredicateError::OutOfRange(_)));
    }

    #[test]
    fn errors_when_required_index_missing() {
        let idx = PercentileIndex::default();
        let err = idx
            .search(0.5, Cmp::Ge, 10.0, FainderMode::LowMemory, None)
            .unwrap_err();
        assert!(matches!(err, PercentilePredicateError::IndexNotLoaded { .. }));
    }

    #[test]
    fn exact_matches_brute_force() {
        let idx = fixture();
        let result = idx.search(0.5, Cmp::Ge, 15.0, FainderMode::Exact, None).unwrap();
        assert_eq!(result, [0u32, 1].into_iter().collect());
    }

    #[test]
    fn mode_containment_precision_exact_recall() {
        let idx = fixture();
        let precision = idx
            .search(0.5, Cmp::Ge, 15.0, FainderMode::FullPrecision, None)
            .unwrap();
        let exact = idx.search(0.5, Cmp::Ge, 15.0, FainderMode::Exact, None).unwrap();
        let recall = idx
            .search(0.5, Cmp::Ge, 15.0, FainderMode::FullRecall, None)
            .unwrap();
        assert!(precision.is_subset(&exact));
        assert!(exact.is_subset(&recall));
    }

    #[test]
    fn exact_is_subset_of_low_memory() {
        let idx = fixture();
        let exact = idx.search(0.5, Cmp::Ge, 15.0, FainderMode::Exact, None).unwrap();
        let low_memory = idx
            .search(0.5, Cmp::Ge, 15.0, FainderMode::LowMemory, None)
            .unwrap();
        assert!(exact.is_subset(&low_memory));
    }

    #[test]
    fn filter_restricts_exact_result() {
        let idx = fixture();
        let filter: RoaringBitmap = [0u32].into_iter().collect();
        let result = idx
            .search(0.5, Cmp::Ge, 15.0, FainderMode::Exact, Some(&filter))
            .unwrap();
        assert_eq!(result, filter);
    }
}
