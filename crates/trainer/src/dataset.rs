//! Raw Telco CSV loading, cleaning, and stratified splitting
//!
//! The raw export carries a `customerID` column, `Churn` as `Yes`/`No`, and
//! `TotalCharges` as text that is blank for brand-new customers. Rows whose
//! `TotalCharges` is not a finite number (blank, text, `NaN`, `inf`) are
//! dropped.

use churn_scoring::{parse_label, CustomerRecord, EvaluationSet, LABEL_COLUMN};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

const TOTAL_CHARGES_COLUMN: &str = "TotalCharges";

/// Cleaned, labelled customer rows
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub records: Vec<CustomerRecord>,
    pub labels: Vec<u8>,
    /// Rows dropped during cleaning
    pub dropped_rows: usize,
}

impl Dataset {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            TrainerError::Dataset(format!("cannot open {}: {e}", path.as_ref().display()))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| TrainerError::Dataset(format!("missing `{name}` column")))
        };
        let label_idx = column(LABEL_COLUMN)?;
        let charges_idx = column(TOTAL_CHARGES_COLUMN)?;

        let mut dataset = Dataset::default();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let line = line + 2;

            let charges = row.get(charges_idx).unwrap_or_default();
            if !charges.parse::<f64>().is_ok_and(f64::is_finite) {
                debug!("line {line}: dropping row with {TOTAL_CHARGES_COLUMN} `{charges}`");
                dataset.dropped_rows += 1;
                continue;
            }

            let raw_label = row.get(label_idx).unwrap_or_default();
            let label = parse_label(raw_label).ok_or_else(|| {
                TrainerError::Dataset(format!("line {line}: invalid {LABEL_COLUMN} `{raw_label}`"))
            })?;

            let record: CustomerRecord = row
                .deserialize(Some(&headers))
                .map_err(|e| TrainerError::Dataset(format!("line {line}: {e}")))?;

            dataset.records.push(record);
            dataset.labels.push(label);
        }

        if dataset.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".to_string()));
        }
        if dataset.dropped_rows > 0 {
            warn!(
                "dropped {} rows with non-numeric {TOTAL_CHARGES_COLUMN}",
                dataset.dropped_rows
            );
        }

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l == 1).count()
    }

    /// Rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            dropped_rows: 0,
        }
    }

    pub fn into_evaluation_set(self) -> Result<EvaluationSet> {
        Ok(EvaluationSet::new(self.records, self.labels)?)
    }
}

/// Stratified train/test split.
///
/// Each class is shuffled with the seed and contributes
/// `round(test_size * class_count)` rows to the test side, so both sides keep
/// the class ratio. Returned indices are sorted.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrainerError::Dataset(format!(
            "test size must be within (0, 1), got {test_size}"
        )));
    }

    let mut rng = LcgRng::new(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        rng.shuffle(&mut members);

        let n_test = ((members.len() as f64 * test_size).round() as usize).clamp(1, members.len());
        if n_test == members.len() {
            return Err(TrainerError::Dataset(format!(
                "class {class} has {} rows, too few to split",
                members.len()
            )));
        }
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

    fn raw_csv() -> String {
        [
            HEADER,
            "7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No",
            "5575-GNVDE,Male,0,No,No,34,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,56.95,1889.5,No",
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
            "4472-LVYGI,Female,0,Yes,Yes,0,No,No phone service,DSL,Yes,No,Yes,Yes,Yes,No,Two year,Yes,Bank transfer (automatic),52.55, ,No",
        ]
        .join("\n")
    }

    #[test]
    fn test_load_drops_blank_total_charges() {
        let dataset = Dataset::from_reader(raw_csv().as_bytes()).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.dropped_rows, 1);
        assert_eq!(dataset.labels, vec![0, 0, 1]);
        assert_eq!(dataset.records[1].total_charges, 1889.5);
        assert_eq!(dataset.records[0].multiple_lines, "No phone service");
    }

    #[test]
    fn test_load_drops_non_finite_total_charges() {
        let csv = [
            HEADER,
            "7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No",
            "0001-NAN,Male,0,No,No,3,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,56.95,NaN,Yes",
            "0002-INF,Male,0,No,No,4,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,56.95,inf,No",
            "0003-NINF,Female,0,No,No,5,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,56.95,-inf,No",
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
        ]
        .join("\n");
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dropped_rows, 3);
        assert!(dataset.records.iter().all(|r| r.total_charges.is_finite()));

        let preprocessor = churn_scoring::Preprocessor::fit(&dataset.records).unwrap();
        assert!(preprocessor.validate().is_ok());
        assert!(preprocessor.scaler.means.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_missing_label_column_rejected() {
        let csv = "gender,TotalCharges\nMale,10\n";
        assert!(Dataset::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_stratified_split_preserves_ratio() {
        let labels: Vec<u8> = (0..100).map(|i| (i % 4 == 0) as u8).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 5);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let labels: Vec<u8> = (0..60).map(|i| (i % 3 == 0) as u8).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 42).unwrap()
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 7).unwrap()
        );
    }

    #[test]
    fn test_invalid_test_size_rejected() {
        assert!(stratified_split(&[0, 1, 0, 1], 1.5, 42).is_err());
    }
}
