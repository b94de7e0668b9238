//! Held-out evaluation set persisted next to the pipeline.
//!
//! CSV layout: the 19 schema columns (any order) plus a `Churn` label column
//! holding `0`/`1` (the raw dataset's `Yes`/`No` is accepted too).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{Result, ScoringError};
use crate::schema::{schema_columns, CustomerRecord, LABEL_COLUMN};

/// Ordered `(record, label)` pairs; never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSet {
    records: Vec<CustomerRecord>,
    labels: Vec<u8>,
}

impl EvaluationSet {
    pub fn new(records: Vec<CustomerRecord>, labels: Vec<u8>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(ScoringError::InvalidDataset(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }
        if let Some(label) = labels.iter().find(|l| **l > 1) {
            return Err(ScoringError::InvalidDataset(format!(
                "labels must be 0 or 1, found {label}"
            )));
        }
        Ok(Self { records, labels })
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let label_idx = headers
            .iter()
            .position(|h| h == LABEL_COLUMN)
            .ok_or_else(|| {
                ScoringError::InvalidDataset(format!("missing `{LABEL_COLUMN}` column"))
            })?;

        let mut records = Vec::new();
        let mut labels = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let record: CustomerRecord = row.deserialize(Some(&headers))?;
            let raw = row.get(label_idx).unwrap_or_default();
            let label = parse_label(raw).ok_or_else(|| {
                ScoringError::InvalidDataset(format!(
                    "row {}: invalid {LABEL_COLUMN} value `{raw}`",
                    line + 2
                ))
            })?;
            records.push(record);
            labels.push(label);
        }

        Self::new(records, labels)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_to(File::create(path)?)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(schema_columns().chain(std::iter::once(LABEL_COLUMN)))?;
        for (record, label) in self.records.iter().zip(&self.labels) {
            let mut fields = record.to_csv_fields();
            fields.push(label.to_string());
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l == 1).count()
    }
}

/// Parse a binary label, accepting `0`/`1` and `No`/`Yes`.
pub fn parse_label(raw: &str) -> Option<u8> {
    match raw.trim() {
        "1" | "Yes" => Some(1),
        "0" | "No" => Some(0),
        _ => None,
    }
}
