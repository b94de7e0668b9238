use churn_scoring::ScoringError;
use thiserror::Error;

/// Errors raised while talking to the scoring service or reading artifacts.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl DashboardError {
    pub(crate) fn api(status: u16, message: impl Into<String>) -> Self {
        DashboardError::Api {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
