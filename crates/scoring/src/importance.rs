//! Feature importances reported by training and read by the dashboard.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{Result, ScoringError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair names with scores and sort by importance, descending.
///
/// The sort is stable, so equal scores keep their feature order.
pub fn rank(names: &[String], scores: &[f64]) -> Result<Vec<FeatureImportance>> {
    if names.len() != scores.len() {
        return Err(ScoringError::FeatureMismatch(format!(
            "{} feature names but {} importance scores",
            names.len(),
            scores.len()
        )));
    }

    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(scores)
        .map(|(feature, importance)| FeatureImportance {
            feature: feature.clone(),
            importance: *importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(Ordering::Equal)
    });
    Ok(ranked)
}

pub fn write_csv<P: AsRef<Path>>(path: P, importances: &[FeatureImportance]) -> Result<()> {
    write_to(File::create(path)?, importances)
}

pub fn write_to<W: Write>(writer: W, importances: &[FeatureImportance]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in importances {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureImportance>> {
    read_from(File::open(path)?)
}

pub fn read_from<R: Read>(reader: R) -> Result<Vec<FeatureImportance>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize::<FeatureImportance>() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_sorts_descending_and_keeps_ties_stable() {
        let ranked = rank(
            &names(&["tenure", "gender_Male", "Contract_Two year", "Partner_Yes"]),
            &[0.2, 0.0, 0.6, 0.2],
        )
        .unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(order, ["Contract_Two year", "tenure", "Partner_Yes", "gender_Male"]);
    }

    #[test]
    fn test_rank_rejects_length_mismatch() {
        assert!(rank(&names(&["a"]), &[]).is_err());
    }

    #[test]
    fn test_csv_has_feature_and_importance_columns() {
        let ranked = rank(&names(&["tenure", "MonthlyCharges"]), &[0.25, 0.75]).unwrap();
        let mut buf = Vec::new();
        write_to(&mut buf, &ranked).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("feature,importance\n"));

        let back = read_from(buf.as_slice()).unwrap();
        assert_eq!(back, ranked);
    }
}
