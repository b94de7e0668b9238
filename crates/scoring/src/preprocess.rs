//! Column-wise preprocessing: numeric standardization and one-hot encoding.
//!
//! Output layout is fixed: the standardized numeric columns first, then one
//! block per categorical column with one slot per training-time category.
//! Categories never seen during fitting encode to an all-zero block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{Result, ScoringError};
use crate::schema::{CustomerRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

/// Per-column `(x - mean) / scale` with population statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(records: &[CustomerRecord]) -> Self {
        let width = NUMERIC_FEATURES.len();
        let n = records.len().max(1) as f64;

        let mut means = vec![0.0; width];
        for record in records {
            for (sum, value) in means.iter_mut().zip(record.numeric_values()) {
                *sum += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut scales = vec![0.0; width];
        for record in records {
            for (i, value) in record.numeric_values().iter().enumerate() {
                let diff = value - means[i];
                scales[i] += diff * diff;
            }
        }
        for scale in &mut scales {
            let std = (*scale / n).sqrt();
            // Constant columns pass through centred but unscaled.
            *scale = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { means, scales }
    }

    fn transform_into(&self, values: &[f64], out: &mut Vec<f64>) {
        for ((value, mean), scale) in values.iter().zip(&self.means).zip(&self.scales) {
            out.push((value - mean) / scale);
        }
    }
}

/// One-hot encoder with sorted per-column category lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(records: &[CustomerRecord]) -> Self {
        let mut sets: Vec<BTreeSet<String>> = vec![BTreeSet::new(); CATEGORICAL_FEATURES.len()];
        for record in records {
            for (set, value) in sets.iter_mut().zip(record.categorical_values()) {
                set.insert(value.to_string());
            }
        }

        Self {
            categories: sets.into_iter().map(|set| set.into_iter().collect()).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn transform_into(&self, values: &[&str], out: &mut Vec<f64>) {
        for (categories, value) in self.categories.iter().zip(values) {
            let start = out.len();
            out.resize(start + categories.len(), 0.0);
            if let Ok(pos) = categories.binary_search_by(|c| c.as_str().cmp(value)) {
                out[start + pos] = 1.0;
            }
        }
    }

    /// Output names in the `<column>_<category>` form.
    pub fn feature_names(&self) -> Vec<String> {
        CATEGORICAL_FEATURES
            .iter()
            .zip(&self.categories)
            .flat_map(|(column, categories)| {
                categories
                    .iter()
                    .map(move |category| format!("{column}_{category}"))
            })
            .collect()
    }
}

/// Fitted preprocessing stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
}

impl Preprocessor {
    pub fn fit(records: &[CustomerRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(ScoringError::InvalidDataset(
                "cannot fit preprocessor on an empty dataset".to_string(),
            ));
        }

        Ok(Self {
            scaler: StandardScaler::fit(records),
            encoder: OneHotEncoder::fit(records),
        })
    }

    /// Number of model input columns produced per record.
    pub fn output_width(&self) -> usize {
        NUMERIC_FEATURES.len() + self.encoder.width()
    }

    pub fn transform(&self, record: &CustomerRecord) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_width());
        self.scaler.transform_into(&record.numeric_values(), &mut out);
        self.encoder
            .transform_into(&record.categorical_values(), &mut out);
        out
    }

    pub fn transform_all(&self, records: &[CustomerRecord]) -> Vec<Vec<f64>> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        NUMERIC_FEATURES
            .iter()
            .map(|name| name.to_string())
            .chain(self.encoder.feature_names())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let numeric = NUMERIC_FEATURES.len();
        if self.scaler.means.len() != numeric || self.scaler.scales.len() != numeric {
            return Err(ScoringError::ValidationFailed(format!(
                "scaler expects {numeric} columns, has {} means and {} scales",
                self.scaler.means.len(),
                self.scaler.scales.len()
            )));
        }
        if let Some(mean) = self.scaler.means.iter().find(|m| !m.is_finite()) {
            return Err(ScoringError::ValidationFailed(format!(
                "scaler has non-finite mean {mean}"
            )));
        }
        if let Some(scale) = self
            .scaler
            .scales
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0)
        {
            return Err(ScoringError::ValidationFailed(format!(
                "scaler has invalid scale {scale}"
            )));
        }
        if self.encoder.categories.len() != CATEGORICAL_FEATURES.len() {
            return Err(ScoringError::ValidationFailed(format!(
                "encoder expects {} columns, has {}",
                CATEGORICAL_FEATURES.len(),
                self.encoder.categories.len()
            )));
        }
        for (column, categories) in CATEGORICAL_FEATURES.iter().zip(&self.encoder.categories) {
            if categories.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ScoringError::ValidationFailed(format!(
                    "categories for {column} are not sorted and unique"
                )));
            }
        }
        Ok(())
    }
}
