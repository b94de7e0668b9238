//! Churn scoring contract
//!
//! Shared by the trainer, the HTTP service, and the dashboard, so every
//! component agrees on the record schema, the fitted artifact, and how a
//! probability becomes a churn decision.
//!
//! Modules:
//! - `schema`: The 19-field customer record and column lists
//! - `preprocess`: Standard scaling and one-hot encoding
//! - `gbdt`: Gradient boosted tree inference
//! - `pipeline`: Fitted pipeline artifact (load, save, hash, score)
//! - `threshold`: Decision threshold and report rounding
//! - `metrics`: Precision, recall, F1, accuracy, PR-AUC
//! - `evaluation`: Held-out evaluation set CSV
//! - `importance`: Ranked feature importances CSV
//! - `serde_canon`: Canonical JSON and BLAKE3 hashing

pub mod errors;
pub mod evaluation;
pub mod gbdt;
pub mod importance;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod schema;
pub mod serde_canon;
pub mod threshold;

pub use errors::{Result, ScoringError};
pub use evaluation::{parse_label, EvaluationSet};
pub use gbdt::{Model, Node, Tree};
pub use importance::FeatureImportance;
pub use metrics::{average_precision, ClassificationMetrics, ClassificationReport, ConfusionMatrix};
pub use pipeline::{FittedPipeline, PipelineMetadata, Scorer};
pub use preprocess::Preprocessor;
pub use schema::{CustomerRecord, CATEGORICAL_FEATURES, LABEL_COLUMN, NUMERIC_FEATURES};
pub use threshold::{round_report, Threshold, DEFAULT_THRESHOLD};

/// Default artifact file names inside a model directory.
pub mod artifacts {
    pub const PIPELINE_FILE: &str = "churn_pipeline.json";
    pub const HASH_FILE: &str = "churn_pipeline.hash";
    pub const TEST_SET_FILE: &str = "test_set.csv";
    pub const IMPORTANCES_FILE: &str = "feature_importances.csv";
}
