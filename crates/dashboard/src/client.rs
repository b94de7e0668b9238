use std::time::Duration;

use churn_scoring::{ClassificationMetrics, CustomerRecord};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DashboardError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `GET /health` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// `POST /predict` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub churn: bool,
    pub probability: f64,
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

/// HTTP client for the churn scoring service.
#[derive(Clone)]
pub struct ChurnClient {
    base_url: Url,
    http: Client,
}

impl ChurnClient {
    /// Create a client for a base URL such as `http://localhost:8000`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_http_client(
            base_url,
            Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        )
    }

    pub fn with_http_client(base_url: impl AsRef<str>, http: Client) -> Result<Self> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| DashboardError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if url.cannot_be_a_base() {
            return Err(DashboardError::InvalidBaseUrl(base_url.as_ref().to_string()));
        }
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.base_url.join("health")?;
        Self::map_response(self.http.get(url).send().await?).await
    }

    /// Score one customer at `threshold`.
    pub async fn predict(&self, record: &CustomerRecord, threshold: f64) -> Result<Prediction> {
        let url = self.with_threshold("predict", threshold)?;
        Self::map_response(self.http.post(url).json(record).send().await?).await
    }

    /// Test-set metrics at `threshold`.
    pub async fn metrics(&self, threshold: f64) -> Result<ClassificationMetrics> {
        let url = self.with_threshold("metrics", threshold)?;
        Self::map_response(self.http.get(url).send().await?).await
    }

    /// Churn probability for every test-set row, in file order.
    pub async fn predict_proba_all(&self) -> Result<Vec<f64>> {
        let url = self.base_url.join("predict_proba_all")?;
        Self::map_response(self.http.get(url).send().await?).await
    }

    fn with_threshold(&self, path: &str, threshold: f64) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut()
            .append_pair("threshold", &threshold.to_string());
        Ok(url)
    }

    async fn map_response<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn map_api_error(response: Response) -> DashboardError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        if let Ok(payload) = serde_json::from_slice::<ErrorPayload>(&bytes) {
            return DashboardError::api(status, payload.error);
        }
        DashboardError::api(status, String::from_utf8_lossy(&bytes).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ChurnClient::new("http://localhost:8000/api").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/api/");
        assert_eq!(
            client.base_url().join("health").unwrap().as_str(),
            "http://localhost:8000/api/health"
        );
    }

    #[test]
    fn threshold_is_sent_as_query() {
        let client = ChurnClient::new("http://localhost:8000").unwrap();
        let url = client.with_threshold("metrics", 0.35).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/metrics?threshold=0.35");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            ChurnClient::new("not a url"),
            Err(DashboardError::InvalidBaseUrl(_))
        ));
    }
}
