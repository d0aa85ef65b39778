//! The persistent worker pool backing parallel `EXACT` refinement. Built
//! once per index load and torn down on every rebuild, with the histogram
//! collection split into one contiguous-range partition per worker for
//! cache locality.

use crate::dsl::ast::Cmp;
use crate::ids::HistId;
use crate::percentile::histogram::Histogram;
use rayon::ThreadPool;
use roaring::RoaringBitmap;

/// A fixed partition of `HistId`s assigned to one worker. Built once at
/// pool-construction time from the loaded histogram collection's key set,
/// sorted so each partition is a contiguous range of ids.
pub struct HistogramPool {
    pool: ThreadPool,
    partitions: Vec<Vec<HistId>>,
}

impl HistogramPool {
    /// Builds a pool with `num_workers` threads (0 means "let rayon pick",
    /// mirroring `os.cpu_count() or 1`) and `num_workers` contiguous
    /// partitions of `hist_ids`.
    pub fn build(hist_ids: &[HistId], num_workers: usize) -> Option<Self> {
        if hist_ids.is_empty() {
            return None;
        }
        let workers = if num_workers == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            num_workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fainder-exact-{i}"))
            .build()
            .ok()?;

        let mut sorted = hist_ids.to_vec();
        sorted.sort_unstable();
        let chunk_size = sorted.len().div_ceil(workers).max(1);
        let partitions = sorted.chunks(chunk_size).map(|c| c.to_vec()).collect();

        Some(Self { pool, partitions })
    }

    /// Refines `candidates` against `histograms`, one task per partition,
    /// unioning the (commutative, order-irrelevant) partial results.
    pub fn refine(
        &self,
        candidates: &RoaringBitmap,
        histograms: &hashbrown::HashMap<HistId, Histogram>,
        p: f64,
        cmp: Cmp,
        reference: f64,
    ) -> RoaringBitmap {
        use rayon::prelude::*;

        self.pool.install(|| {
            self.partitions
                .par_iter()
                .map(|partition| {
                    let mut out = RoaringBitmap::new();
                    for &hist in partition {
                        if candidates.contains(hist)
                            && histograms
                                .get(&hist)
                                .is_some_and(|h| h.satisfies(p, cmp, reference))
                        {
                            out.insert(hist);
                        }
                    }
                    out
                })
                .reduce(RoaringBitmap::new, |a, b| a | b)
        })
    }
}

impl std::fmt::Debug for HistogramPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistogramPool")
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hashbrown::HashMap;

    #[test]
    fn refine_matches_serial_evaluation() {
        let mut histograms = HashMap::new();
        for h in 0u32..50 {
            histograms.insert(
                h,
                Histogram::from_counts(vec![h as f64, h as f64 + 10.0], vec![1, 1]),
            );
        }
        let hist_ids: Vec<HistId> = histograms.keys().copied().collect();
        let pool = HistogramPool::build(&hist_ids, 4).unwrap();

        let candidates: RoaringBitmap = hist_ids.iter().copied().collect();
        let parallel = pool.refine(&candidates, &histograms, 0.5, Cmp::Ge, 20.0);

        let serial: RoaringBitmap = histograms
            .iter()
            .filter(|(_, h)| h.satisfies(0.5, Cmp::Ge, 20.0))
            .map(|(&id, _)| id)
            .collect();

        assert_eq!(parallel, serial);
    }

    #[test]
    fn empty_histogram_set_builds_no_pool() {
        assert!(HistogramPool::build(&[], 4).is_none());
    }
}
