//! Decision threshold for the binary churn call.
//!
//! The threshold is a per-request parameter, not part of the fitted model.
//! [`DEFAULT_THRESHOLD`] is the only default in the workspace; the service and
//! the dashboard both refer to it.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScoringError};

/// Default probability cutoff when the caller does not supply one.
pub const DEFAULT_THRESHOLD: f64 = 0.40;

/// Number of decimals used for every reported probability and metric.
pub const REPORT_DECIMALS: i32 = 3;

/// Round a reported value to [`REPORT_DECIMALS`] decimals.
pub fn round_report(value: f64) -> f64 {
    let factor = 10f64.powi(REPORT_DECIMALS);
    (value * factor).round() / factor
}

/// A validated threshold in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ScoringError::InvalidThreshold(format!(
                "threshold must be within [0, 1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Churn decision for a probability.
    ///
    /// The comparison uses the probability as reported to callers (rounded),
    /// so `churn == (probability >= threshold)` holds on every response and
    /// offline metrics count exactly the decisions callers receive.
    pub fn decide(self, probability: f64) -> bool {
        round_report(probability) >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ScoringError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_forty_percent() {
        assert_eq!(Threshold::default().value(), 0.40);
    }

    #[test]
    fn test_range_validation() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(Threshold::new(-0.01).is_err());
        assert!(Threshold::new(1.01).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert!(Threshold::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_decision_matches_reported_probability() {
        let t = Threshold::new(0.4).unwrap();
        // 0.3996 is reported as 0.4, so it must be a churn decision.
        assert!(t.decide(0.3996));
        assert!(!t.decide(0.3994));
        assert!(t.decide(0.9));
    }

    #[test]
    fn test_edges() {
        assert!(Threshold::new(0.0).unwrap().decide(0.0));
        assert!(!Threshold::new(1.0).unwrap().decide(0.9994));
        assert!(Threshold::new(1.0).unwrap().decide(1.0));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Threshold>("0.25").is_ok());
        assert!(serde_json::from_str::<Threshold>("1.5").is_err());
    }
}
