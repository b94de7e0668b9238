//! Customer record schema shared by training, serving, and the dashboard.
//!
//! Field names are part of the wire contract: they match the Telco dataset
//! headers exactly, both in JSON request bodies and in CSV artifacts.

use serde::{Deserialize, Serialize};

/// Numeric input columns, in canonical feature order.
pub const NUMERIC_FEATURES: [&str; 4] = ["SeniorCitizen", "tenure", "MonthlyCharges", "TotalCharges"];

/// Categorical input columns, in canonical feature order.
pub const CATEGORICAL_FEATURES: [&str; 15] = [
    "gender",
    "Partner",
    "Dependents",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
];

/// Name of the binary target column in tabular artifacts.
pub const LABEL_COLUMN: &str = "Churn";

/// Total number of fields in a [`CustomerRecord`].
pub const FIELD_COUNT: usize = NUMERIC_FEATURES.len() + CATEGORICAL_FEATURES.len();

/// All schema columns: numerics first, then categoricals.
pub fn schema_columns() -> impl Iterator<Item = &'static str> {
    NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .copied()
}

/// One customer, exactly as the fitted pipeline expects it.
///
/// Every field is required. Deserialization fails on a missing field or a
/// value of the wrong JSON type; unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: i64,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    pub tenure: i64,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Numeric values in [`NUMERIC_FEATURES`] order.
    pub fn numeric_values(&self) -> [f64; 4] {
        [
            self.senior_citizen as f64,
            self.tenure as f64,
            self.monthly_charges,
            self.total_charges,
        ]
    }

    /// Categorical values in [`CATEGORICAL_FEATURES`] order.
    pub fn categorical_values(&self) -> [&str; 15] {
        [
            &self.gender,
            &self.partner,
            &self.dependents,
            &self.phone_service,
            &self.multiple_lines,
            &self.internet_service,
            &self.online_security,
            &self.online_backup,
            &self.device_protection,
            &self.tech_support,
            &self.streaming_tv,
            &self.streaming_movies,
            &self.contract,
            &self.paperless_billing,
            &self.payment_method,
        ]
    }

    /// Field values rendered for a CSV row, in [`schema_columns`] order.
    pub fn to_csv_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(FIELD_COUNT);
        fields.push(self.senior_citizen.to_string());
        fields.push(self.tenure.to_string());
        fields.push(self.monthly_charges.to_string());
        fields.push(self.total_charges.to_string());
        fields.extend(self.categorical_values().iter().map(|v| v.to_string()));
        fields
    }

    /// Reference customer used for warm-up inference and smoke tests.
    pub fn sample() -> Self {
        Self {
            gender: "Male".into(),
            senior_citizen: 0,
            partner: "Yes".into(),
            dependents: "No".into(),
            tenure: 1,
            phone_service: "Yes".into(),
            multiple_lines: "No".into(),
            internet_service: "DSL".into(),
            online_security: "No".into(),
            online_backup: "No".into(),
            device_protection: "No".into(),
            tech_support: "No".into(),
            streaming_tv: "No".into(),
            streaming_movies: "No".into(),
            contract: "Month-to-month".into(),
            paperless_billing: "Yes".into(),
            payment_method: "Electronic check".into(),
            monthly_charges: 50.0,
            total_charges: 50.0,
        }
    }
}
