//! Fitted pipeline artifact: preprocessing + GBDT classifier.
//!
//! The artifact is written once by the trainer as canonical JSON, with its
//! BLAKE3 digest in a sibling `.hash` file, and loaded read-only by the
//! service. Nothing mutates a pipeline after it has been loaded.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{Result, ScoringError};
use crate::gbdt::Model;
use crate::preprocess::Preprocessor;
use crate::schema::CustomerRecord;
use crate::serde_canon::{hash_json_hex, to_canonical_json};

/// Anything that maps a customer record to a churn probability in `[0, 1]`.
pub trait Scorer: Send + Sync {
    fn score(&self, record: &CustomerRecord) -> Result<f64>;

    /// Score many records, preserving input order.
    fn score_all(&self, records: &[CustomerRecord]) -> Result<Vec<f64>> {
        records.iter().map(|record| self.score(record)).collect()
    }
}

/// How the pipeline was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    /// Unix timestamp (seconds) of the training run
    pub created_at: i64,
    /// Rows the final model was fitted on
    pub training_rows: usize,
    /// Selected hyperparameters, by name
    pub hyperparameters: BTreeMap<String, f64>,
    /// Mean cross-validated recall of the selected hyperparameters
    pub cv_recall: Option<f64>,
}

impl PipelineMetadata {
    pub fn now(training_rows: usize) -> Self {
        Self {
            created_at: Utc::now().timestamp(),
            training_rows,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub preprocessor: Preprocessor,
    pub model: Model,
    /// Names of the preprocessed columns the model consumes
    pub feature_names: Vec<String>,
    pub metadata: PipelineMetadata,
}

impl FittedPipeline {
    pub fn new(preprocessor: Preprocessor, model: Model, metadata: PipelineMetadata) -> Result<Self> {
        let feature_names = preprocessor.feature_names();
        let pipeline = Self {
            preprocessor,
            model,
            feature_names,
            metadata,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocessor.validate()?;

        let width = self.preprocessor.output_width();
        if self.feature_names.len() != width {
            return Err(ScoringError::ValidationFailed(format!(
                "pipeline lists {} feature names but preprocessing yields {width} columns",
                self.feature_names.len()
            )));
        }

        self.model.validate(width)
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(hash_json_hex(&self.to_canonical_json()?))
    }

    /// Write the artifact and its `.hash` sibling. Returns the digest.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        let json = self.to_canonical_json()?;
        let hash = hash_json_hex(&json);
        fs::write(path, &json)?;
        fs::write(hash_path_for(path), &hash)?;
        Ok(hash)
    }

    /// Load and validate an artifact.
    ///
    /// When a `.hash` sibling exists the file contents must match it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;

        let hash_path = hash_path_for(path);
        if hash_path.exists() {
            let expected = fs::read_to_string(&hash_path)?;
            let actual = hash_json_hex(&json);
            if expected.trim() != actual {
                return Err(ScoringError::ValidationFailed(format!(
                    "artifact hash mismatch: expected {}, computed {actual}",
                    expected.trim()
                )));
            }
            debug!("verified pipeline hash {actual}");
        }

        let pipeline: FittedPipeline = serde_json::from_str(&json)?;
        pipeline.validate()?;
        Ok(pipeline)
    }
}

impl Scorer for FittedPipeline {
    fn score(&self, record: &CustomerRecord) -> Result<f64> {
        let features = self.preprocessor.transform(record);
        let probability = self.model.predict_proba(&features);
        if !probability.is_finite() {
            return Err(ScoringError::ScoringFailed(format!(
                "model produced non-finite probability {probability}"
            )));
        }
        Ok(probability.clamp(0.0, 1.0))
    }
}

/// Path of the digest file stored next to an artifact.
pub fn hash_path_for(path: &Path) -> PathBuf {
    path.with_extension("hash")
}
