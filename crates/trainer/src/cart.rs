//! CART regression tree builder for gradient boosting
//!
//! Implements deterministic exact-greedy tree construction over quantized
//! candidate thresholds. Each feature keeps at most [`MAX_BINS`] cut points;
//! a sample falls in bin `k` when `cuts[k-1] < value <= cuts[k]`, so sending
//! bins `0..=k` left is the same as `value <= cuts[k]` at inference time.

use churn_scoring::gbdt::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Maximum number of candidate thresholds per feature
pub const MAX_BINS: usize = 256;

/// Feature matrix with per-feature cut points and pre-computed bins
#[derive(Clone, Debug)]
pub struct BinnedMatrix {
    cuts: Vec<Vec<f64>>,
    /// Feature-major bin indices: `bins[feature][row]`
    bins: Vec<Vec<u16>>,
    rows: usize,
}

impl BinnedMatrix {
    pub fn new(features: &[Vec<f64>]) -> Self {
        let rows = features.len();
        let feature_count = features.first().map_or(0, Vec::len);

        let mut cuts = Vec::with_capacity(feature_count);
        let mut bins = Vec::with_capacity(feature_count);
        for j in 0..feature_count {
            let column: Vec<f64> = features.iter().map(|row| row[j]).collect();
            let feature_cuts = quantile_cuts(&column);
            bins.push(
                column
                    .iter()
                    .map(|v| feature_cuts.partition_point(|c| c < v) as u16)
                    .collect(),
            );
            cuts.push(feature_cuts);
        }

        Self { cuts, bins, rows }
    }

    pub fn feature_count(&self) -> usize {
        self.cuts.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cuts(&self, feature_idx: usize) -> &[f64] {
        &self.cuts[feature_idx]
    }
}

/// Sorted distinct values, thinned to evenly spaced quantiles when there are
/// more than [`MAX_BINS`]. The largest value is always kept.
fn quantile_cuts(column: &[f64]) -> Vec<f64> {
    let mut values: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();

    if values.len() <= MAX_BINS {
        return values;
    }

    let n = values.len();
    let mut cuts: Vec<f64> = (1..MAX_BINS).map(|k| values[k * n / MAX_BINS]).collect();
    cuts.push(values[n - 1]);
    cuts.dedup();
    cuts
}

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Shrinkage folded into leaf values
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            learning_rate: 0.3,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    bin: usize,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, bin: usize, gain: f64, node_id: usize) -> Self {
        Self {
            feature_idx,
            bin,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, bin, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain
            || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// A built tree plus the total split gain it attributed to each feature
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub tree: Tree,
    pub gains: Vec<f64>,
}

/// Build a regression tree on gradient statistics
pub struct CartBuilder<'a> {
    matrix: &'a BinnedMatrix,
    gradients: &'a [f64],
    hessians: &'a [f64],
    /// Features this tree may split on
    features: &'a [usize],
    config: TreeConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        matrix: &'a BinnedMatrix,
        gradients: &'a [f64],
        hessians: &'a [f64],
        features: &'a [usize],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(matrix.rows(), gradients.len());
        debug_assert_eq!(matrix.rows(), hessians.len());

        Self {
            matrix,
            gradients,
            hessians,
            features,
            config,
        }
    }

    /// Build a tree over the given sample rows
    pub fn build(&self, rows: &[usize]) -> BuiltTree {
        let mut nodes = Vec::new();
        let mut gains = vec![0.0; self.matrix.feature_count()];

        self.build_node(rows, 0, 0, &mut nodes, &mut gains);

        BuiltTree {
            tree: Tree::new(nodes),
            gains,
        }
    }

    /// Recursively build tree nodes; returns the index of the created node
    fn build_node(
        &self,
        rows: &[usize],
        depth: usize,
        node_id: usize,
        nodes: &mut Vec<Node>,
        gains: &mut [f64],
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let (sum_g, sum_h) = self.sum_gradients_hessians(rows);

        let split = if depth < self.config.max_depth {
            self.find_best_split(rows, sum_g, sum_h, node_id)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current_idx, self.leaf_value(sum_g, sum_h)));
            return current_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&row| (self.matrix.bins[split.feature_idx][row] as usize) <= split.bin);

        gains[split.feature_idx] += split.gain;

        // Reserve space for current node
        let threshold = self.matrix.cuts[split.feature_idx][split.bin];
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(&left_rows, depth + 1, node_id * 2 + 1, nodes, gains);
        let right_idx = self.build_node(&right_rows, depth + 1, node_id * 2 + 2, nodes, gains);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Find best split using per-feature gradient histograms
    fn find_best_split(
        &self,
        rows: &[usize],
        sum_g: f64,
        sum_h: f64,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let lambda = self.config.lambda;
        let parent_score = sum_g * sum_g / (sum_h + lambda);
        let mut best: Option<SplitCandidate> = None;

        for &feature_idx in self.features {
            let cuts = &self.matrix.cuts[feature_idx];
            if cuts.len() < 2 {
                continue;
            }

            let bins = &self.matrix.bins[feature_idx];
            let mut hist_g = vec![0.0; cuts.len() + 1];
            let mut hist_h = vec![0.0; cuts.len() + 1];
            for &row in rows {
                let bin = bins[row] as usize;
                hist_g[bin] += self.gradients[row];
                hist_h[bin] += self.hessians[row];
            }

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for bin in 0..cuts.len() {
                g_left += hist_g[bin];
                h_left += hist_h[bin];
                let g_right = sum_g - g_left;
                let h_right = sum_h - h_left;

                if h_left <= 0.0
                    || h_right <= 0.0
                    || h_left < self.config.min_child_weight
                    || h_right < self.config.min_child_weight
                {
                    continue;
                }

                let gain = 0.5
                    * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                        - parent_score)
                    - self.config.gamma;
                if gain <= 0.0 {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, bin, gain, node_id);
                best = match best {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best
    }

    /// Sum gradients and hessians for a set of samples
    fn sum_gradients_hessians(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &row| {
            (g + self.gradients[row], h + self.hessians[row])
        })
    }

    /// Optimal leaf weight `-G / (H + lambda)`, shrunk by the learning rate
    fn leaf_value(&self, sum_g: f64, sum_h: f64) -> f64 {
        -sum_g / (sum_h + self.config.lambda) * self.config.learning_rate
    }
}
