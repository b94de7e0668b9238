//! Binary classification metrics over probabilities and a decision threshold.
//!
//! - **Precision, Recall, F1**: for the positive (churn) class; a zero
//!   denominator yields 0.
//! - **Accuracy**: share of correct decisions over both classes.
//! - **PR-AUC**: average precision, the step-wise area under the
//!   precision-recall curve computed from raw probabilities, so it does not
//!   depend on the threshold.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::errors::{Result, ScoringError};
use crate::threshold::{round_report, Threshold};

/// Confusion matrix for binary classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Churners flagged as churn.
    pub tp: usize,
    /// Loyal customers passed as loyal.
    pub tn: usize,
    /// Loyal customers flagged as churn.
    pub fp: usize,
    /// Churners missed.
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, actual_churn: bool, predicted_churn: bool) {
        match (actual_churn, predicted_churn) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    pub fn from_decisions(labels: &[u8], decisions: &[bool]) -> Self {
        let mut cm = Self::new();
        for (label, decision) in labels.iter().zip(decisions) {
            cm.record(*label == 1, *decision);
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Per-class scores for the positive class.
    pub fn positive(&self) -> ClassMetrics {
        ClassMetrics::from_counts(self.tp, self.fp, self.fn_)
    }

    /// Per-class scores for the negative class.
    pub fn negative(&self) -> ClassMetrics {
        ClassMetrics::from_counts(self.tn, self.fn_, self.fp)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(hits: usize, false_alarms: usize, misses: usize) -> Self {
        let precision = ratio(hits, hits + false_alarms);
        let recall = ratio(hits, hits + misses);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1_score,
            support: hits + misses,
        }
    }
}

/// Apply a threshold to each probability.
pub fn decisions(probabilities: &[f64], threshold: Threshold) -> Vec<bool> {
    probabilities.iter().map(|p| threshold.decide(*p)).collect()
}

/// Average precision of `scores` against binary `labels`.
///
/// Tied scores form a single operating point. Rows with a non-finite score
/// are never ranked, so their positives count as missed. Returns 0 when there
/// are no positive labels.
pub fn average_precision(labels: &[u8], scores: &[f64]) -> f64 {
    let total_pos = labels.iter().filter(|l| **l == 1).count();
    if total_pos == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len().min(labels.len()))
        .filter(|&i| scores[i].is_finite())
        .collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_recall = 0.0;

    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        while i < order.len() && scores[order[i]] == score {
            if labels[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let recall = tp as f64 / total_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    ap
}

/// Aggregate metrics as reported by the service, rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
    pub pr_auc: f64,
}

impl ClassificationMetrics {
    pub fn compute(labels: &[u8], probabilities: &[f64], threshold: Threshold) -> Result<Self> {
        if labels.len() != probabilities.len() {
            return Err(ScoringError::InvalidDataset(format!(
                "{} labels but {} probabilities",
                labels.len(),
                probabilities.len()
            )));
        }

        let cm = ConfusionMatrix::from_decisions(labels, &decisions(probabilities, threshold));
        let positive = cm.positive();

        Ok(Self {
            threshold: round_report(threshold.value()),
            precision: round_report(positive.precision),
            recall: round_report(positive.recall),
            f1_score: round_report(positive.f1_score),
            accuracy: round_report(cm.accuracy()),
            pr_auc: round_report(average_precision(labels, probabilities)),
        })
    }
}

/// Two-class report in the familiar per-class table form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationReport {
    pub confusion: ConfusionMatrix,
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn new(labels: &[u8], probabilities: &[f64], threshold: Threshold) -> Self {
        let confusion = ConfusionMatrix::from_decisions(labels, &decisions(probabilities, threshold));
        Self {
            confusion,
            negative: confusion.negative(),
            positive: confusion.positive(),
            accuracy: confusion.accuracy(),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for (label, m) in [("0", self.negative), ("1", self.positive)] {
            writeln!(
                f,
                "{:>8} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(
            f,
            "{:>8} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion.total()
        )?;
        write!(
            f,
            "confusion matrix: [[{} {}] [{} {}]]",
            self.confusion.tn, self.confusion.fp, self.confusion.fn_, self.confusion.tp
        )
    }
}
