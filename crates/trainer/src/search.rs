//! Hyperparameter grid search with stratified k-fold cross-validation
//!
//! Candidates are enumerated with parameter names in alphabetical order and
//! the last name varying fastest. Every (candidate, fold) fit runs on the
//! rayon pool; the winner is the first candidate with the highest mean
//! validation recall.

use churn_scoring::{metrics::decisions, ConfusionMatrix, Threshold};
use rayon::prelude::*;
use std::str::FromStr;
use tracing::{debug, info};

use crate::errors::{Result, TrainerError};
use crate::trainer::{GbdtTrainer, TrainingParams};

/// Decision cut used to score folds
pub const CV_DECISION_CUT: f64 = 0.5;

/// Values to try for each tuned hyperparameter
#[derive(Clone, Debug, PartialEq)]
pub struct ParamGrid {
    pub colsample_bytree: Vec<f64>,
    pub gamma: Vec<f64>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub min_child_weight: Vec<f64>,
    pub n_estimators: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl ParamGrid {
    /// The full 128-candidate grid
    pub fn full() -> Self {
        Self {
            colsample_bytree: vec![0.8, 1.0],
            gamma: vec![0.0, 1.0],
            learning_rate: vec![0.01, 0.1],
            max_depth: vec![3, 4],
            min_child_weight: vec![1.0, 5.0],
            n_estimators: vec![100, 200],
            subsample: vec![0.7, 1.0],
        }
    }

    /// A single candidate for smoke runs
    pub fn quick() -> Self {
        Self {
            colsample_bytree: vec![0.8],
            gamma: vec![0.0],
            learning_rate: vec![0.1],
            max_depth: vec![4],
            min_child_weight: vec![1.0],
            n_estimators: vec![100],
            subsample: vec![0.7],
        }
    }

    pub fn len(&self) -> usize {
        self.colsample_bytree.len()
            * self.gamma.len()
            * self.learning_rate.len()
            * self.max_depth.len()
            * self.min_child_weight.len()
            * self.n_estimators.len()
            * self.subsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the grid over a base configuration
    pub fn candidates(&self, base: &TrainingParams) -> Vec<TrainingParams> {
        let mut out = Vec::with_capacity(self.len());
        for &colsample_bytree in &self.colsample_bytree {
            for &gamma in &self.gamma {
                for &learning_rate in &self.learning_rate {
                    for &max_depth in &self.max_depth {
                        for &min_child_weight in &self.min_child_weight {
                            for &n_estimators in &self.n_estimators {
                                for &subsample in &self.subsample {
                                    out.push(TrainingParams {
                                        colsample_bytree,
                                        gamma,
                                        learning_rate,
                                        max_depth,
                                        min_child_weight,
                                        n_estimators,
                                        subsample,
                                        ..base.clone()
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Named grid presets selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridPreset {
    Full,
    Quick,
}

impl GridPreset {
    pub fn grid(self) -> ParamGrid {
        match self {
            GridPreset::Full => ParamGrid::full(),
            GridPreset::Quick => ParamGrid::quick(),
        }
    }
}

impl FromStr for GridPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(GridPreset::Full),
            "quick" => Ok(GridPreset::Quick),
            other => Err(format!("unknown grid `{other}` (expected `full` or `quick`)")),
        }
    }
}

/// Stratified k-fold assignment without shuffling.
///
/// Each class's rows, in order, are cut into `k` contiguous chunks whose sizes
/// differ by at most one; fold `f` validates on chunk `f` of every class.
/// Returns `(train, validation)` index pairs.
pub fn stratified_kfold(labels: &[u8], k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(TrainerError::Training(format!("need at least 2 folds, got {k}")));
    }

    let mut fold_of = vec![0usize; labels.len()];
    for class in [0u8, 1u8] {
        let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.len() < k {
            return Err(TrainerError::Training(format!(
                "class {class} has {} rows, fewer than {k} folds",
                members.len()
            )));
        }

        let base = members.len() / k;
        let extra = members.len() % k;
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            for &row in &members[start..start + size] {
                fold_of[row] = fold;
            }
            start += size;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            (train, validation)
        })
        .collect())
}

/// Cross-validated score of one candidate
#[derive(Clone, Debug)]
pub struct CandidateScore {
    pub params: TrainingParams,
    pub fold_recalls: Vec<f64>,
    pub mean_recall: f64,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best: TrainingParams,
    pub best_recall: f64,
    pub scores: Vec<CandidateScore>,
}

/// Grid search driver
pub struct GridSearch {
    grid: ParamGrid,
    folds: usize,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self { grid, folds }
    }

    /// Run every candidate over every fold and pick the best mean recall
    pub fn run(&self, base: &TrainingParams, features: &[Vec<f64>], labels: &[u8]) -> Result<SearchResult> {
        if self.grid.is_empty() {
            return Err(TrainerError::Training("parameter grid is empty".to_string()));
        }

        let candidates = self.grid.candidates(base);
        let folds = stratified_kfold(labels, self.folds)?;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            folds.len() * candidates.len()
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let recalls: Vec<f64> = jobs
            .par_iter()
            .map(|&(c, f)| fold_recall(&candidates[c], &folds[f], features, labels))
            .collect::<Result<_>>()?;

        let scores: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(recalls.chunks(folds.len()))
            .map(|(params, fold_recalls)| {
                let mean_recall = fold_recalls.iter().sum::<f64>() / fold_recalls.len() as f64;
                debug!("candidate {params:?}: mean recall {mean_recall:.4}");
                CandidateScore {
                    params,
                    fold_recalls: fold_recalls.to_vec(),
                    mean_recall,
                }
            })
            .collect();

        let mut best_idx = 0;
        for (idx, score) in scores.iter().enumerate().skip(1) {
            if score.mean_recall > scores[best_idx].mean_recall {
                best_idx = idx;
            }
        }

        Ok(SearchResult {
            best: scores[best_idx].params.clone(),
            best_recall: scores[best_idx].mean_recall,
            scores,
        })
    }
}

fn fold_recall(
    params: &TrainingParams,
    (train, validation): &(Vec<usize>, Vec<usize>),
    features: &[Vec<f64>],
    labels: &[u8],
) -> Result<f64> {
    let pick_rows = |idx: &[usize]| idx.iter().map(|&i| features[i].clone()).collect::<Vec<_>>();
    let pick_labels = |idx: &[usize]| idx.iter().map(|&i| labels[i]).collect::<Vec<_>>();

    let trained = GbdtTrainer::new(params.clone()).train(&pick_rows(train), &pick_labels(train))?;
    let probs = trained.predict_proba(&pick_rows(validation));
    let cut = Threshold::new(CV_DECISION_CUT)?;
    let cm = ConfusionMatrix::from_decisions(&pick_labels(validation), &decisions(&probs, cut));
    Ok(cm.positive().recall)
}
