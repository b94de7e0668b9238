//! Plain-text charts for the terminal.

use churn_scoring::FeatureImportance;
use std::fmt::Write;

/// Number of probability bins in the distribution chart.
pub const HISTOGRAM_BINS: usize = 30;

const BAR: char = '█';

/// Bar length in cells for `value` on a scale where `max` fills `width`.
fn bar_len(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round() as usize
}

/// Horizontal bar chart of feature importances, in the given order.
pub fn importance_chart(importances: &[FeatureImportance], width: usize) -> String {
    let label_width = importances
        .iter()
        .map(|row| row.feature.chars().count())
        .max()
        .unwrap_or(0);
    let max = importances
        .iter()
        .map(|row| row.importance)
        .fold(0.0_f64, f64::max);

    let mut out = String::new();
    for row in importances {
        let bar: String = std::iter::repeat(BAR)
            .take(bar_len(row.importance, max, width))
            .collect();
        let _ = writeln!(
            out,
            "{:<label_width$} | {:<width$} {:.4}",
            row.feature, bar, row.importance
        );
    }
    out
}

/// Equal-width bin counts over `[0, 1]`; a probability of exactly 1 lands in
/// the last bin. Non-finite values are skipped.
pub fn histogram(probabilities: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    if bins == 0 {
        return counts;
    }
    for &p in probabilities.iter().filter(|p| p.is_finite()) {
        let idx = (p.clamp(0.0, 1.0) * bins as f64) as usize;
        counts[idx.min(bins - 1)] += 1;
    }
    counts
}

/// Probability distribution as one row per bin.
pub fn histogram_chart(probabilities: &[f64], bins: usize, width: usize) -> String {
    let counts = histogram(probabilities, bins);
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    let step = 1.0 / bins.max(1) as f64;

    let mut out = String::new();
    for (i, &count) in counts.iter().enumerate() {
        let lo = i as f64 * step;
        let bar: String = std::iter::repeat(BAR)
            .take(bar_len(count as f64, max, width))
            .collect();
        let _ = writeln!(
            out,
            "{:.3}-{:.3} | {:<width$} {}",
            lo,
            lo + step,
            bar,
            count
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(feature: &str, importance: f64) -> FeatureImportance {
        FeatureImportance {
            feature: feature.to_string(),
            importance,
        }
    }

    #[test]
    fn histogram_bins_edges() {
        let counts = histogram(&[0.0, 0.01, 0.5, 0.999, 1.0, f64::NAN], HISTOGRAM_BINS);
        assert_eq!(counts.len(), HISTOGRAM_BINS);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[15], 1);
        assert_eq!(counts[29], 2);
        assert_eq!(counts.iter().sum::<usize>(), 5);
    }

    #[test]
    fn histogram_of_nothing_is_empty() {
        assert!(histogram(&[], 10).iter().all(|&c| c == 0));
        assert!(histogram(&[0.3], 0).is_empty());
    }

    #[test]
    fn largest_importance_fills_width() {
        let chart = importance_chart(&[row("Contract_Two year", 0.5), row("tenure", 0.25)], 20);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches(BAR).count(), 20);
        assert_eq!(lines[1].matches(BAR).count(), 10);
        assert!(lines[0].ends_with("0.5000"));
        // Labels are padded so the bars line up.
        assert_eq!(lines[0].find('|'), lines[1].find('|'));
    }

    #[test]
    fn zero_importance_has_no_bar() {
        let chart = importance_chart(&[row("gender_Male", 0.0)], 10);
        assert_eq!(chart.matches(BAR).count(), 0);
    }

    #[test]
    fn histogram_chart_has_one_row_per_bin() {
        let chart = histogram_chart(&[0.1, 0.2, 0.2], HISTOGRAM_BINS, 10);
        assert_eq!(chart.lines().count(), HISTOGRAM_BINS);
        assert!(chart.lines().next().unwrap().starts_with("0.000-0.033"));
    }
}
