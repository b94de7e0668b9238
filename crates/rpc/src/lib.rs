//! HTTP scoring service for the churn pipeline
//!
//! Routes:
//! - `GET /health`: liveness probe
//! - `POST /predict?threshold=`: score one customer record
//! - `GET /metrics?threshold=`: classification metrics over the evaluation set
//! - `GET /predict_proba_all`: raw probabilities for every evaluation row

pub mod server;

pub use server::{build_router, start_server, AppState, PredictResponse};
