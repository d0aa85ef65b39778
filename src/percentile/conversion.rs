//! The conversion index: a discretized-percentile grid enabling
//! `FULL_PRECISION`/`FULL_RECALL` approximate search and candidate
//! generation for `EXACT`, realized as a sorted-by-value array per
//! discretized percentile step.

use crate::dsl::ast::Cmp;
use crate::ids::HistId;
use crate::percentile::histogram::Histogram;
use roaring::RoaringBitmap;

/// One discretized percentile's sorted `(value, HistId)` array, enabling a
/// binary-search cut rather than a linear scan over every histogram.
#[derive(Debug, Clone)]
struct PercentileColumn {
    /// The exact percentile this column was built at (e.g. 0.37 for step 0.01).
    step: f64,
    /// Sorted ascending by value.
    values: Vec<(f64, HistId)>,
}

impl PercentileColumn {
    fn search(&self, cmp: Cmp, reference: f64) -> RoaringBitmap {
        // `values` is sorted ascending by value; `partition_point` finds the
        // boundary directly rather than scanning.
        match cmp {
            Cmp::Ge => {
                let idx = self.values.partition_point(|&(v, _)| v < reference);
                self.values[idx..].iter().map(|&(_, h)| h).collect()
            }
            Cmp::Gt => {
                let idx = self.values.partition_point(|&(v, _)| v <= reference);
                self.values[idx..].iter().map(|&(_, h)| h).collect()
            }
            Cmp::Le => {
                let idx = self.values.partition_point(|&(v, _)| v <= reference);
                self.values[..idx].iter().map(|&(_, h)| h).collect()
            }
            Cmp::Lt => {
                let idx = self.values.partition_point(|&(v, _)| v < reference);
                self.values[..idx].iter().map(|&(_, h)| h).collect()
            }
        }
    }
}

/// Which neighboring grid step to use for a query percentile that doesn't
/// land exactly on the grid, and in which bias. See module doc on
/// `ConversionIndex::search` for the monotonicity argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    /// No false positives: fewer results, all correct.
    Precision,
    /// No false negatives: more results, possibly some incorrect.
    Recall,
}

/// A discretized grid of [`PercentileColumn`]s, one per step of `step_size`
/// from `step_size` to `1.0` inclusive.
#[derive(Debug, Clone)]
pub struct ConversionIndex {
    step_size: f64,
    columns: Vec<PercentileColumn>,
}

impl ConversionIndex {
    /// Builds the grid from a fully-loaded histogram set. `step_size` is
    /// the discretization granularity, a tunable with a default of `0.01`.
    pub fn build(histograms: &hashbrown::HashMap<HistId, Histogram>, step_size: f64) -> Self {
        let steps = ((1.0 / step_size).round() as usize).max(1);
        let columns = (1..=steps)
            .map(|i| {
                let step = (i as f64 * step_size).min(1.0);
                let mut values: Vec<(f64, HistId)> = histograms
                    .iter()
                    .map(|(&hist, h)| (h.percentile_value(step), hist))
                    .collect();
                values.sort_by(|a, b| a.0.total_cmp(&b.0));
                PercentileColumn { step, values }
            })
            .collect();
        Self { step_size, columns }
    }

    /// The largest step `<= p`, or `None` if `p` falls below the grid's
    /// smallest step (no safe floor exists).
    fn nearest_floor(&self, p: f64) -> Option<&PercentileColumn> {
        self.columns.iter().rev().find(|c| c.step <= p + f64::EPSILON)
    }

    /// The smallest step `>= p`; always exists because the grid's last
    /// step is `1.0` and `p <= 1.0` by construction.
    fn nearest_ceil(&self, p: f64) -> &PercentileColumn {
        self.columns
            .iter()
            .find(|c| c.step >= p - f64::EPSILON)
            .unwrap_or_else(|| self.columns.last().unwrap())
    }

    /// Picks the grid column and bias for `(p, cmp)` per the monotonicity
    /// argument: since `percentile_value` is non-decreasing in `p`,
    /// `ge`/`gt` queries are conservative (no false positives) when
    /// evaluated at the floor step, and inclusive (no false negatives) at
    /// the ceil step; `le`/`lt` is the mirror image.
    fn column_for(&self, p: f64, cmp: Cmp, bias: Bias) -> Option<&PercentileColumn> {
        let use_floor = match (cmp, bias) {
            (Cmp::Ge | Cmp::Gt, Bias::Precision) => true,
            (Cmp::Ge | Cmp::Gt, Bias::Recall) => false,
            (Cmp::Le | Cmp::Lt, Bias::Precision) => false,
            (Cmp::Le | Cmp::Lt, Bias::Recall) => true,
        };
        if use_floor {
            self.nearest_floor(p)
        } else {
            Some(self.nearest_ceil(p))
        }
    }

    /// `FULL_PRECISION`/`FULL_RECALL` search. Returns the empty
    /// set when `p` falls below the grid's smallest step and the precision
    /// bias has no safe floor to evaluate at (no false positives is still
    /// honored: emptiness is always a conservative answer).
    pub fn search_approx(&self, p: f64, cmp: Cmp, reference: f64, recall: bool) -> RoaringBitmap {
        let bias = if recall { Bias::Recall } else { Bias::Precision };
        match self.column_for(p, cmp, bias) {
            Some(col) => col.search(cmp, reference),
            None => RoaringBitmap::new(),
        }
    }

    /// The candidate set for `EXACT` mode: the recall-biased (superset)
    /// approximation, refined by the caller against real histograms.
    pub fn candidates(&self, p: f64, cmp: Cmp, reference: f64) -> RoaringBitmap {
        self.search_approx(p, cmp, reference, true)
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }
}
