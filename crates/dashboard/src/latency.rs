//! Latency checks and a small load generator for the scoring service.
//!
//! Workers share an atomic request counter and each one drives its own
//! sequence of `/predict` calls until the counter passes the requested
//! total. A concurrency of 1 gives a plain sequential latency run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use churn_scoring::CustomerRecord;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::client::ChurnClient;
use crate::error::Result;

/// Health checks slower than this fail the latency run.
pub const DEFAULT_MAX_HEALTH_MS: u64 = 100;

/// Order statistics over a set of request latencies, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    /// `None` for an empty sample.
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1_000.0).collect();
        ms.sort_by(f64::total_cmp);

        let n = ms.len();
        let p95_idx = ((n as f64) * 0.95).ceil() as usize - 1;
        Some(Self {
            count: n,
            p50_ms: ms[n / 2],
            p95_ms: ms[p95_idx.min(n - 1)],
            mean_ms: ms.iter().sum::<f64>() / n as f64,
            min_ms: ms[0],
            max_ms: ms[n - 1],
        })
    }
}

/// Outcome of a `/predict` load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(serialize_with = "duration_ms")]
    pub elapsed: Duration,
    pub latency: Option<LatencySummary>,
}

impl LoadReport {
    /// Successful requests per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.succeeded as f64 / secs
        } else {
            0.0
        }
    }
}

fn duration_ms<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1_000.0)
}

/// Time one `/health` round trip.
pub async fn time_health(client: &ChurnClient) -> Result<Duration> {
    let start = Instant::now();
    client.health().await?;
    Ok(start.elapsed())
}

/// Untimed `/predict` calls that open connections before measuring.
pub async fn warm_up(client: &ChurnClient, record: &CustomerRecord, threshold: f64, rounds: usize) {
    for round in 0..rounds {
        if let Err(err) = client.predict(record, threshold).await {
            warn!("Warm-up request {round} failed: {err}");
        }
    }
}

/// Issue `requests` `/predict` calls across `concurrency` workers.
///
/// Failed requests are counted and left out of the latency summary.
pub async fn run_predict_load(
    client: &ChurnClient,
    record: &CustomerRecord,
    threshold: f64,
    requests: usize,
    concurrency: usize,
) -> LoadReport {
    let counter = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let latencies = Arc::new(Mutex::new(Vec::with_capacity(requests)));
    let record = Arc::new(record.clone());

    let start = Instant::now();
    let mut workers = JoinSet::new();
    for _ in 0..concurrency.clamp(1, requests.max(1)) {
        let client = client.clone();
        let record = Arc::clone(&record);
        let counter = Arc::clone(&counter);
        let failures = Arc::clone(&failures);
        let latencies = Arc::clone(&latencies);
        workers.spawn(async move {
            loop {
                let idx = counter.fetch_add(1, Ordering::Relaxed);
                if idx >= requests {
                    break;
                }
                let sent_at = Instant::now();
                match client.predict(&record, threshold).await {
                    Ok(_) => latencies.lock().await.push(sent_at.elapsed()),
                    Err(err) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        debug!("Request {idx} failed: {err}");
                    }
                }
            }
        });
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            warn!("Load worker aborted: {err}");
        }
    }
    let elapsed = start.elapsed();

    let samples = latencies.lock().await;
    let failed = failures.load(Ordering::Relaxed);
    LoadReport {
        requested: requests,
        succeeded: samples.len(),
        failed,
        elapsed,
        latency: LatencySummary::from_samples(&samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[test]
    fn summary_of_empty_sample_is_none() {
        assert!(LatencySummary::from_samples(&[]).is_none());
    }

    #[test]
    fn summary_order_statistics() {
        let samples = ms(&(1..=20).rev().collect::<Vec<_>>());
        let summary = LatencySummary::from_samples(&samples).unwrap();

        assert_eq!(summary.count, 20);
        assert_eq!(summary.min_ms, 1.0);
        assert_eq!(summary.max_ms, 20.0);
        assert_eq!(summary.p50_ms, 11.0);
        assert_eq!(summary.p95_ms, 19.0);
        assert!((summary.mean_ms - 10.5).abs() < 1e-9);
    }

    #[test]
    fn single_sample_fills_every_statistic() {
        let summary = LatencySummary::from_samples(&ms(&[7])).unwrap();
        assert_eq!(summary.p50_ms, 7.0);
        assert_eq!(summary.p95_ms, 7.0);
        assert_eq!(summary.min_ms, summary.max_ms);
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        let report = LoadReport {
            requested: 0,
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            latency: None,
        };
        assert_eq!(report.throughput(), 0.0);
    }
}
