//! Binary-logistic GBDT ensemble.
//!
//! The model output is an additive margin (`base_margin + Σ tree(x)`);
//! the positive-class probability is `sigmoid(margin)`. Learning rate is
//! already folded into the stored leaf values.

use super::tree::Tree;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScoringError};

/// Current serialized model format version
pub const MODEL_VERSION: i32 = 1;

/// Logistic function, numerically stable for large |x|.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`sigmoid`], clamped away from 0 and 1.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-7, 1.0 - 1e-7);
    (p / (1.0 - p)).ln()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Initial margin (log-odds) before any tree contribution
    pub base_margin: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl Model {
    pub fn new(trees: Vec<Tree>, base_margin: f64) -> Self {
        Self {
            version: MODEL_VERSION,
            base_margin,
            trees,
        }
    }

    /// Validate model structure against the expected input width.
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(ScoringError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_margin.is_finite() {
            return Err(ScoringError::ValidationFailed(format!(
                "Invalid base margin: {}",
                self.base_margin
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ScoringError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;

            if let Some(max_idx) = tree.max_feature_idx() {
                if max_idx >= feature_count {
                    return Err(ScoringError::ValidationFailed(format!(
                        "Tree {i} splits on feature {max_idx} but only {feature_count} features exist"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Raw additive score for a feature vector.
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_margin, |sum, tree| sum + tree.evaluate(features))
    }

    /// Positive-class probability in `[0, 1]`.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 0.0, 1, 2),
            Node::leaf(1, -1.0),
            Node::leaf(2, 1.0),
        ]);
        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 0.5, 1, 2),
            Node::leaf(1, -0.5),
            Node::leaf(2, 0.5),
        ]);
        Model::new(vec![tree1, tree2], 0.25)
    }

    #[test]
    fn test_margin_accumulates_trees() {
        let model = create_test_model();
        assert_eq!(model.margin(&[-1.0, 0.0]), 0.25 - 1.0 - 0.5);
        assert_eq!(model.margin(&[1.0, 1.0]), 0.25 + 1.0 + 0.5);
    }

    #[test]
    fn test_probability_bounds() {
        let model = create_test_model();
        for features in [[-1.0, 0.0], [1.0, 1.0], [0.0, 0.5]] {
            let p = model.predict_proba(&features);
            assert!((0.0..=1.0).contains(&p));
        }
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
    }

    #[test]
    fn test_logit_inverts_sigmoid() {
        for p in [0.1, 0.265, 0.5, 0.9] {
            assert!((sigmoid(logit(p)) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_model_validation() {
        let model = create_test_model();
        assert!(model.validate(2).is_ok());
        // Tree 2 splits on feature 1
        assert!(model.validate(1).is_err());

        let mut bad = create_test_model();
        bad.version = 999;
        assert!(bad.validate(2).is_err());

        let mut bad = create_test_model();
        bad.base_margin = f64::NAN;
        assert!(bad.validate(2).is_err());
    }

    #[test]
    fn test_deterministic_inference() {
        let model = create_test_model();
        let features = [0.3, 0.7];
        let first = model.predict_proba(&features);
        assert!((0..100).all(|_| model.predict_proba(&features) == first));
    }
}
