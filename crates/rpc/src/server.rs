use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use churn_scoring::{
    round_report, ClassificationMetrics, CustomerRecord, EvaluationSet, FittedPipeline, Scorer,
    Threshold, DEFAULT_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Immutable service context shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<dyn Scorer>,
    pub evaluation: Option<Arc<EvaluationSet>>,
    /// BLAKE3 digest of the loaded pipeline artifact, when known
    pub model_hash: Option<String>,
}

impl AppState {
    pub fn new(scorer: Arc<dyn Scorer>, evaluation: Option<EvaluationSet>) -> Self {
        Self {
            scorer,
            evaluation: evaluation.map(Arc::new),
            model_hash: None,
        }
    }

    /// Load the pipeline (required) and the evaluation set (optional).
    pub fn load(model_path: &Path, test_set_path: &Path) -> Result<Self> {
        let pipeline = FittedPipeline::load(model_path)
            .with_context(|| format!("failed to load pipeline from {}", model_path.display()))?;
        let model_hash = pipeline.hash_hex().ok();
        info!(
            "Loaded pipeline {} ({} trees, {} features, hash {})",
            model_path.display(),
            pipeline.model.num_trees(),
            pipeline.feature_names.len(),
            model_hash.as_deref().unwrap_or("unknown")
        );

        let evaluation = match EvaluationSet::from_csv(test_set_path) {
            Ok(set) => {
                info!(
                    "Loaded evaluation set {} ({} rows, {} churners)",
                    test_set_path.display(),
                    set.len(),
                    set.positives()
                );
                Some(set)
            }
            Err(err) => {
                warn!(
                    "Evaluation set {} unavailable, /metrics and /predict_proba_all disabled: {err}",
                    test_set_path.display()
                );
                None
            }
        };

        let mut state = Self::new(Arc::new(pipeline), evaluation);
        state.model_hash = model_hash;
        Ok(state)
    }

    /// Score the reference record once so the first request is not cold.
    pub fn warm_up(&self) {
        let start = Instant::now();
        match self.scorer.score(&CustomerRecord::sample()) {
            Ok(p) => info!(
                "Warm-up inference ok: p={:.3} in {:.2} ms",
                p,
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(err) => warn!("Warm-up inference failed: {err}"),
        }
    }

    fn evaluation(&self) -> Result<Arc<EvaluationSet>, ApiError> {
        self.evaluation.clone().ok_or_else(|| {
            ApiError::service_unavailable("Test set not available; start the service with test_set.csv")
        })
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub churn: bool,
    pub probability: f64,
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
struct ThresholdQuery {
    threshold: Option<f64>,
}

impl ThresholdQuery {
    fn resolve(query: Result<Query<ThresholdQuery>, QueryRejection>) -> Result<Threshold, ApiError> {
        let Query(query) = query.map_err(|rejection| ApiError::unprocessable(rejection.body_text()))?;
        Threshold::new(query.threshold.unwrap_or(DEFAULT_THRESHOLD))
            .map_err(|err| ApiError::unprocessable(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unprocessable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => Self::unprocessable(err.body_text()),
            JsonRejection::JsonSyntaxError(err) => Self::bad_request(err.body_text()),
            other => Self::new(other.status(), other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("Churn API listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("scoring server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/metrics", get(handle_metrics))
        .route("/predict_proba_all", get(handle_predict_proba_all))
        .layer(middleware::from_fn(log_latency))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Logs `METHOD path - N.NN ms - status S` for every request.
async fn log_latency(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} - {:.2} ms - status {}",
        method,
        path,
        start.elapsed().as_secs_f64() * 1000.0,
        response.status().as_u16()
    );
    response
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn handle_predict(
    State(state): State<SharedState>,
    query: Result<Query<ThresholdQuery>, QueryRejection>,
    body: Result<Json<CustomerRecord>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let threshold = ThresholdQuery::resolve(query)?;
    let Json(record) = body?;

    let probability = state
        .scorer
        .score(&record)
        .map_err(|err| ApiError::internal(format!("inference failed: {err}")))?;
    debug!("scored record: p={probability}");

    Ok(Json(PredictResponse {
        churn: threshold.decide(probability),
        probability: round_report(probability),
        threshold: threshold.value(),
    }))
}

async fn handle_metrics(
    State(state): State<SharedState>,
    query: Result<Query<ThresholdQuery>, QueryRejection>,
) -> Result<Json<ClassificationMetrics>, ApiError> {
    let threshold = ThresholdQuery::resolve(query)?;
    let evaluation = state.evaluation()?;
    let scorer = state.scorer.clone();

    let metrics = tokio::task::spawn_blocking(move || {
        let probabilities = scorer.score_all(evaluation.records())?;
        ClassificationMetrics::compute(evaluation.labels(), &probabilities, threshold)
    })
    .await
    .map_err(|err| ApiError::internal(format!("metrics task failed: {err}")))?
    .map_err(|err| ApiError::internal(format!("metrics computation failed: {err}")))?;

    Ok(Json(metrics))
}

async fn handle_predict_proba_all(
    State(state): State<SharedState>,
) -> Result<Json<Vec<f64>>, ApiError> {
    let evaluation = state.evaluation()?;
    let scorer = state.scorer.clone();

    let probabilities = tokio::task::spawn_blocking(move || scorer.score_all(evaluation.records()))
        .await
        .map_err(|err| ApiError::internal(format!("scoring task failed: {err}")))?
        .map_err(|err| ApiError::internal(format!("bulk scoring failed: {err}")))?;

    Ok(Json(probabilities))
}
