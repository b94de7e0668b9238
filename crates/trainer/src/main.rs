//! Churn GBDT Trainer CLI
//!
//! Trains the churn pipeline from the raw Telco CSV and writes the artifacts
//! the scoring service loads.

use anyhow::{Context, Result};
use clap::Parser;
use churn_trainer::{train_pipeline, Dataset, GridPreset, TrainOptions, VERSION};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "churn-train")]
#[command(author = "Churn Scoring Contributors")]
#[command(version = VERSION)]
#[command(about = "Train the churn prediction pipeline", long_about = None)]
struct Args {
    /// Raw Telco customer CSV (with customerID and Churn Yes/No columns)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for pipeline, hash, test set and importances
    #[arg(short, long, default_value = "app/model")]
    output: PathBuf,

    /// Cross-validation folds
    #[arg(long, default_value = "5")]
    folds: usize,

    /// Random seed for splitting and sampling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Fraction of rows held out as the test set
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Hyperparameter grid: `full` or `quick`
    #[arg(long, default_value = "full")]
    grid: GridPreset,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to set tracing subscriber: {err}"))?;

    info!("Churn GBDT Trainer v{}", VERSION);
    info!("═══════════════════════════════════════════");

    info!("Loading dataset from: {}", args.input.display());
    let dataset = Dataset::from_csv(&args.input).context("Failed to load dataset")?;
    info!(
        "Loaded {} customers ({} churners, {} rows dropped)",
        dataset.len(),
        dataset.positives(),
        dataset.dropped_rows
    );

    let options = TrainOptions {
        test_size: args.test_size,
        folds: args.folds,
        seed: args.seed,
        grid: args.grid.grid(),
    };

    info!("Training configuration:");
    info!("  Grid: {:?} ({} candidates)", args.grid, options.grid.len());
    info!("  Folds: {}", options.folds);
    info!("  Test size: {}", options.test_size);
    info!("  Seed: {}", options.seed);

    info!("═══════════════════════════════════════════");
    info!("Starting training...");
    let outcome = train_pipeline(&dataset, &options).context("Training failed")?;

    info!("Training complete!");
    info!("  Trees: {}", outcome.pipeline.model.num_trees());
    info!("  Features: {}", outcome.pipeline.feature_names.len());
    info!("Classification report (test split):\n{}", outcome.report);
    for top in outcome.importances.iter().take(5) {
        info!("  {:<40} {:.4}", top.feature, top.importance);
    }

    let paths = outcome
        .write_artifacts(&args.output)
        .with_context(|| format!("Failed to write artifacts to {}", args.output.display()))?;

    info!("═══════════════════════════════════════════");
    info!("✓ Training completed successfully");
    info!("  Pipeline: {}", paths.pipeline.display());
    info!("  Hash: {} ({})", paths.hash.display(), paths.hash_hex);
    info!("  Test set: {}", paths.test_set.display());
    info!("  Importances: {}", paths.importances.display());

    Ok(())
}
