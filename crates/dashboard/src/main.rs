//! Churn Dashboard CLI
//!
//! Scores customers, explains test-set metrics, and charts the model through
//! the scoring service.

use anyhow::{Context, Result};
use churn_dashboard::latency::{self, DEFAULT_MAX_HEALTH_MS};
use churn_dashboard::render::{histogram_chart, importance_chart, HISTOGRAM_BINS};
use churn_dashboard::{ChurnClient, CustomerForm, DashboardError, LatencySummary};
use churn_scoring::artifacts::{IMPORTANCES_FILE, TEST_SET_FILE};
use churn_scoring::{importance, CustomerRecord, EvaluationSet, Threshold, DEFAULT_THRESHOLD};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CHART_WIDTH: usize = 50;

#[derive(Parser)]
#[command(name = "churn-dashboard")]
#[command(about = "Terminal dashboard for the churn scoring service", long_about = None)]
#[command(version)]
struct Cli {
    /// Scoring service base URL
    #[arg(long, env = "CHURN_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one customer
    Predict {
        #[command(flatten)]
        customer: CustomerForm,

        /// Classification threshold
        #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
        threshold: f64,
    },
    /// Explain test-set metrics at a threshold
    Metrics {
        #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
        threshold: f64,
    },
    /// Feature importances and the probability distribution
    Analysis {
        /// Directory holding the training artifacts
        #[arg(long, default_value = "app/model")]
        model_dir: PathBuf,
    },
    /// Service liveness and round-trip latency
    Health,
    /// Time /predict under sequential or concurrent load and gate /health latency
    Latency {
        /// Timed /predict requests
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
        requests: u64,

        /// Concurrent workers (1 runs the requests sequentially)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: u64,

        /// Untimed requests sent before measuring
        #[arg(long, default_value_t = 3)]
        warmup: usize,

        #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
        threshold: f64,

        /// Fail when a /health round trip exceeds this many milliseconds
        #[arg(long, default_value_t = DEFAULT_MAX_HEALTH_MS)]
        max_health_ms: u64,
    },
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    Threshold::new(value)
        .map(Threshold::value)
        .map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to set tracing subscriber: {err}"))?;

    let client = ChurnClient::new(&cli.api_url)
        .with_context(|| format!("Invalid API URL {}", cli.api_url))?;
    info!("Using scoring service at {}", client.base_url());

    match cli.command {
        Commands::Predict {
            customer,
            threshold,
        } => handle_predict(&client, customer.into(), threshold).await,
        Commands::Metrics { threshold } => handle_metrics(&client, threshold).await,
        Commands::Analysis { model_dir } => handle_analysis(&client, model_dir).await,
        Commands::Health => handle_health(&client).await,
        Commands::Latency {
            requests,
            concurrency,
            warmup,
            threshold,
            max_health_ms,
        } => {
            handle_latency(
                &client,
                requests as usize,
                concurrency as usize,
                warmup,
                threshold,
                Duration::from_millis(max_health_ms),
            )
            .await
        }
    }
}

async fn handle_predict(client: &ChurnClient, record: CustomerRecord, threshold: f64) -> Result<()> {
    match client.predict(&record, threshold).await {
        Ok(prediction) => {
            println!(
                "Churn: {} (probability={}, threshold={})",
                prediction.churn, prediction.probability, prediction.threshold
            );
            Ok(())
        }
        Err(err @ DashboardError::Api { .. }) => {
            println!("{err}");
            anyhow::bail!("prediction rejected by the service")
        }
        Err(err) => Err(err).context("Failed to reach the scoring service"),
    }
}

async fn handle_metrics(client: &ChurnClient, threshold: f64) -> Result<()> {
    let metrics = match client.metrics(threshold).await {
        Ok(metrics) => metrics,
        Err(err) => {
            warn!("Unable to fetch metrics: {err}");
            println!("Metrics unavailable: {err}");
            return Ok(());
        }
    };

    println!("Test-set metrics");
    println!();
    println!("threshold  {}", metrics.threshold);
    println!("  Probability at or above which a customer is flagged as churning.");
    println!("  With p = 0.45 and threshold 0.40 the model says churn.");
    println!();
    println!("precision  {}", metrics.precision);
    println!("  Of the customers flagged as churning, the share that really churned.");
    println!("  Low precision means loyal customers get needless retention offers.");
    println!();
    println!("recall     {}", metrics.recall);
    println!("  Of the customers who really churned, the share the model caught.");
    println!("  Low recall means departing customers go unnoticed.");
    println!();
    println!("f1_score   {}", metrics.f1_score);
    println!("  Harmonic mean of precision and recall; rewards balance between them.");
    println!();
    println!("accuracy   {}", metrics.accuracy);
    println!("  Share of all customers classified correctly.");
    println!();
    println!("pr_auc     {}", metrics.pr_auc);
    println!("  Area under the precision-recall curve; ranking quality regardless of threshold.");
    println!();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

async fn handle_analysis(client: &ChurnClient, model_dir: PathBuf) -> Result<()> {
    println!("Feature importances");
    match importance::read_csv(model_dir.join(IMPORTANCES_FILE)) {
        Ok(rows) => print!("{}", importance_chart(&rows, CHART_WIDTH)),
        Err(err) => println!("Feature importances unavailable: {err} (run churn-train first)"),
    }
    println!();

    println!("Churn probability distribution (test set)");
    let expected_rows = match EvaluationSet::from_csv(model_dir.join(TEST_SET_FILE)) {
        Ok(set) => Some(set.len()),
        Err(err) => {
            warn!("Local test set unavailable: {err}");
            None
        }
    };

    match client.predict_proba_all().await {
        Ok(probabilities) => {
            if let Some(rows) = expected_rows {
                if rows != probabilities.len() {
                    warn!(
                        "Service returned {} probabilities but {} has {} rows",
                        probabilities.len(),
                        TEST_SET_FILE,
                        rows
                    );
                }
            }
            print!(
                "{}",
                histogram_chart(&probabilities, HISTOGRAM_BINS, CHART_WIDTH)
            );
            println!("{} customers", probabilities.len());
        }
        Err(err) => println!("Probabilities unavailable: {err}"),
    }
    Ok(())
}

async fn handle_health(client: &ChurnClient) -> Result<()> {
    let start = Instant::now();
    let health = client
        .health()
        .await
        .context("Failed to reach the scoring service")?;
    let elapsed = start.elapsed();

    println!("{}", serde_json::to_string_pretty(&health)?);
    println!("Round trip: {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

async fn handle_latency(
    client: &ChurnClient,
    requests: usize,
    concurrency: usize,
    warmup: usize,
    threshold: f64,
    max_health: Duration,
) -> Result<()> {
    let record = CustomerRecord::sample();

    latency::warm_up(client, &record, threshold, warmup).await;
    let report = latency::run_predict_load(client, &record, threshold, requests, concurrency).await;

    println!(
        "/predict: {} requests, concurrency {}, {} ok, {} failed, {:.1} req/s",
        report.requested,
        concurrency,
        report.succeeded,
        report.failed,
        report.throughput()
    );
    match &report.latency {
        Some(summary) => print_summary(summary),
        None => println!("  no successful requests"),
    }

    let health = latency::time_health(client)
        .await
        .context("Failed to reach the scoring service")?;
    let health_ms = health.as_secs_f64() * 1000.0;
    println!(
        "/health: {:.2} ms (limit {} ms)",
        health_ms,
        max_health.as_millis()
    );

    if health > max_health {
        anyhow::bail!(
            "/health took {:.2} ms, over the {} ms limit",
            health_ms,
            max_health.as_millis()
        );
    }
    if report.failed > 0 {
        anyhow::bail!("{} of {} /predict requests failed", report.failed, report.requested);
    }
    Ok(())
}

fn print_summary(summary: &LatencySummary) {
    println!("  P50:  {:.2} ms", summary.p50_ms);
    println!("  P95:  {:.2} ms", summary.p95_ms);
    println!("  mean: {:.2} ms", summary.mean_ms);
    println!("  min:  {:.2} ms", summary.min_ms);
    println!("  max:  {:.2} ms", summary.max_ms);
}
