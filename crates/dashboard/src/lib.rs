//! Terminal dashboard for the churn scoring service.
//!
//! - [`client`]: typed HTTP client for `/health`, `/predict`, `/metrics` and
//!   `/predict_proba_all`
//! - [`form`]: command-line form producing a [`churn_scoring::CustomerRecord`]
//! - [`render`]: text bar charts and the probability histogram
//! - [`latency`]: health latency check and a concurrent `/predict` load run

pub mod client;
pub mod error;
pub mod form;
pub mod latency;
pub mod render;

pub use client::{ChurnClient, HealthStatus, Prediction};
pub use error::{DashboardError, Result};
pub use form::CustomerForm;
pub use latency::{LatencySummary, LoadReport};
