//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Binary logistic objective with second-order (gradient + hessian) tree
//! fitting. Row and column sampling draw from a seeded LCG, so a given
//! `(data, params)` pair always yields the same model.

use churn_scoring::gbdt::{logit, sigmoid, Model, Tree};
use std::collections::BTreeMap;

use crate::cart::{BinnedMatrix, CartBuilder, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

/// Hessian floor keeping leaf weights finite on saturated predictions
const MIN_HESSIAN: f64 = 1e-16;

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    pub gamma: f64,
    pub lambda: f64,
    /// Weight of each positive sample; negatives weigh 1
    pub scale_pos_weight: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 4,
            learning_rate: 0.1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
            lambda: 1.0,
            scale_pos_weight: 1.0,
            seed: 42,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<()> {
        let unit = |v: f64| v > 0.0 && v <= 1.0;
        let problem = if self.n_estimators == 0 {
            Some("n_estimators must be positive")
        } else if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            Some("learning_rate must be positive")
        } else if !unit(self.subsample) {
            Some("subsample must be within (0, 1]")
        } else if !unit(self.colsample_bytree) {
            Some("colsample_bytree must be within (0, 1]")
        } else if self.min_child_weight < 0.0 || self.gamma < 0.0 || self.lambda < 0.0 {
            Some("min_child_weight, gamma and lambda must be non-negative")
        } else if !(self.scale_pos_weight > 0.0 && self.scale_pos_weight.is_finite()) {
            Some("scale_pos_weight must be positive")
        } else {
            None
        };

        match problem {
            Some(message) => Err(TrainerError::Training(format!("{message}: {self:?}"))),
            None => Ok(()),
        }
    }

    /// Named values recorded in the pipeline metadata
    pub fn to_hyperparameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("n_estimators".to_string(), self.n_estimators as f64),
            ("max_depth".to_string(), self.max_depth as f64),
            ("learning_rate".to_string(), self.learning_rate),
            ("subsample".to_string(), self.subsample),
            ("colsample_bytree".to_string(), self.colsample_bytree),
            ("min_child_weight".to_string(), self.min_child_weight),
            ("gamma".to_string(), self.gamma),
            ("lambda".to_string(), self.lambda),
            ("scale_pos_weight".to_string(), self.scale_pos_weight),
        ])
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            gamma: self.gamma,
            learning_rate: self.learning_rate,
        }
    }
}

/// Fitted ensemble plus normalized gain importance per input feature
#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub model: Model,
    pub importances: Vec<f64>,
}

impl TrainedModel {
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features.iter().map(|row| self.model.predict_proba(row)).collect()
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    /// Train a binary classifier on preprocessed features and 0/1 labels
    pub fn train(&self, features: &[Vec<f64>], labels: &[u8]) -> Result<TrainedModel> {
        self.params.validate()?;
        if features.is_empty() {
            return Err(TrainerError::Training("no training rows".to_string()));
        }
        if features.len() != labels.len() {
            return Err(TrainerError::Training(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let n_samples = features.len();
        let matrix = BinnedMatrix::new(features);
        let feature_count = matrix.feature_count();
        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let weights: Vec<f64> = labels
            .iter()
            .map(|&l| if l == 1 { self.params.scale_pos_weight } else { 1.0 })
            .collect();

        let base_margin = self.base_margin(&targets, &weights);
        let mut margins = vec![base_margin; n_samples];
        let mut gradients = vec![0.0; n_samples];
        let mut hessians = vec![0.0; n_samples];
        let mut total_gains = vec![0.0; feature_count];
        let mut trees: Vec<Tree> = Vec::with_capacity(self.params.n_estimators);
        let mut rng = LcgRng::new(self.params.seed);
        let tree_config = self.params.tree_config();

        for tree_idx in 0..self.params.n_estimators {
            for i in 0..n_samples {
                let p = sigmoid(margins[i]);
                gradients[i] = weights[i] * (p - targets[i]);
                hessians[i] = (weights[i] * p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let rows = self.sample_rows(&mut rng, n_samples);
            let columns = self.sample_columns(&mut rng, feature_count);

            let built = CartBuilder::new(&matrix, &gradients, &hessians, &columns, tree_config.clone())
                .build(&rows);

            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += built.tree.evaluate(row);
            }
            for (total, gain) in total_gains.iter_mut().zip(&built.gains) {
                *total += gain;
            }

            tracing::trace!(
                "tree {}/{}: {} nodes over {} rows",
                tree_idx + 1,
                self.params.n_estimators,
                built.tree.nodes.len(),
                rows.len()
            );
            trees.push(built.tree);
        }

        Ok(TrainedModel {
            model: Model::new(trees, base_margin),
            importances: normalize(&total_gains),
        })
    }

    /// Log-odds of the weighted positive rate
    fn base_margin(&self, targets: &[f64], weights: &[f64]) -> f64 {
        let total: f64 = weights.iter().sum();
        let positive: f64 = targets.iter().zip(weights).map(|(t, w)| t * w).sum();
        logit(positive / total)
    }

    fn sample_rows(&self, rng: &mut LcgRng, n_samples: usize) -> Vec<usize> {
        if self.params.subsample >= 1.0 {
            return (0..n_samples).collect();
        }
        let rows: Vec<usize> = (0..n_samples)
            .filter(|_| rng.next_f64() < self.params.subsample)
            .collect();
        if rows.is_empty() {
            (0..n_samples).collect()
        } else {
            rows
        }
    }

    fn sample_columns(&self, rng: &mut LcgRng, feature_count: usize) -> Vec<usize> {
        let k = ((self.params.colsample_bytree * feature_count as f64).round() as usize)
            .clamp(1, feature_count.max(1));
        if k >= feature_count {
            return (0..feature_count).collect();
        }
        rng.sample_indices(feature_count, k)
    }
}

/// Scale non-negative scores to sum to one; all zeros stay zero
fn normalize(scores: &[f64]) -> Vec<f64> {
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        scores.iter().map(|s| s / total).collect()
    } else {
        vec![0.0; scores.len()]
    }
}
