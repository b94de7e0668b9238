//! Churn Trainer - Deterministic offline GBDT trainer
//!
//! Turns the raw Telco customer export into the artifacts the scoring
//! service loads: the fitted pipeline (with its hash), the held-out test
//! set, and ranked feature importances.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod search;
pub mod trainer;

use churn_scoring::{
    artifacts, importance, ClassificationReport, EvaluationSet, FeatureImportance, FittedPipeline,
    PipelineMetadata, Preprocessor, Scorer, Threshold,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use dataset::{stratified_split, Dataset};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use search::{stratified_kfold, GridPreset, GridSearch, ParamGrid, SearchResult};
pub use trainer::{GbdtTrainer, TrainedModel, TrainingParams};

use errors::Result;

/// Knobs of a full training run
#[derive(Clone, Debug)]
pub struct TrainOptions {
    pub test_size: f64,
    pub folds: usize,
    pub seed: u64,
    pub grid: ParamGrid,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            folds: 5,
            seed: 42,
            grid: ParamGrid::full(),
        }
    }
}

/// Everything a training run produces
#[derive(Debug)]
pub struct TrainingOutcome {
    pub pipeline: FittedPipeline,
    pub test_set: EvaluationSet,
    pub importances: Vec<FeatureImportance>,
    pub search: SearchResult,
    /// Test-split report at the cross-validation decision cut
    pub report: ClassificationReport,
    pub scale_pos_weight: f64,
}

/// Paths written by [`TrainingOutcome::write_artifacts`]
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub pipeline: PathBuf,
    pub hash: PathBuf,
    pub hash_hex: String,
    pub test_set: PathBuf,
    pub importances: PathBuf,
}

/// Split, tune, refit, and evaluate the churn pipeline
pub fn train_pipeline(dataset: &Dataset, options: &TrainOptions) -> Result<TrainingOutcome> {
    let (train_idx, test_idx) = stratified_split(&dataset.labels, options.test_size, options.seed)?;
    let train = dataset.subset(&train_idx);
    let test = dataset.subset(&test_idx);
    info!(
        "Split {} rows into {} train / {} test ({} / {} churners)",
        dataset.len(),
        train.len(),
        test.len(),
        train.positives(),
        test.positives()
    );

    let preprocessor = Preprocessor::fit(&train.records)?;
    let features = preprocessor.transform_all(&train.records);

    let positives = train.positives();
    if positives == 0 {
        return Err(TrainerError::Dataset("training split has no churners".to_string()));
    }
    let scale_pos_weight = (train.len() - positives) as f64 / positives as f64;
    info!("scale_pos_weight = {scale_pos_weight:.4}");

    let base = TrainingParams {
        scale_pos_weight,
        seed: options.seed,
        ..TrainingParams::default()
    };
    let search = GridSearch::new(options.grid.clone(), options.folds).run(&base, &features, &train.labels)?;
    info!("Best params: {:?}", search.best);
    info!("Best CV recall: {:.4}", search.best_recall);

    let trained = GbdtTrainer::new(search.best.clone()).train(&features, &train.labels)?;

    let mut metadata = PipelineMetadata::now(train.len());
    metadata.hyperparameters = search.best.to_hyperparameters();
    metadata.cv_recall = Some(search.best_recall);
    let importances = importance::rank(&preprocessor.feature_names(), &trained.importances)?;
    let pipeline = FittedPipeline::new(preprocessor, trained.model, metadata)?;

    let test_set = test.into_evaluation_set()?;
    let probabilities = pipeline.score_all(test_set.records())?;
    let report = ClassificationReport::new(
        test_set.labels(),
        &probabilities,
        Threshold::new(search::CV_DECISION_CUT)?,
    );

    Ok(TrainingOutcome {
        pipeline,
        test_set,
        importances,
        search,
        report,
        scale_pos_weight,
    })
}

impl TrainingOutcome {
    /// Persist the pipeline, its hash, the test split, and importances
    pub fn write_artifacts(&self, output_dir: &Path) -> Result<ArtifactPaths> {
        fs::create_dir_all(output_dir)?;

        let pipeline = output_dir.join(artifacts::PIPELINE_FILE);
        let hash_hex = self.pipeline.save(&pipeline)?;
        let test_set = output_dir.join(artifacts::TEST_SET_FILE);
        self.test_set.write_csv(&test_set)?;
        let importances = output_dir.join(artifacts::IMPORTANCES_FILE);
        importance::write_csv(&importances, &self.importances)?;

        Ok(ArtifactPaths {
            hash: output_dir.join(artifacts::HASH_FILE),
            pipeline,
            hash_hex,
            test_set,
            importances,
        })
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
