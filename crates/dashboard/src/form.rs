//! Command-line form for a single customer.
//!
//! Every field has a default, so `churn-dashboard predict` alone scores a
//! typical month-to-month DSL customer.

use churn_scoring::CustomerRecord;
use clap::{value_parser, Args};

const YES_NO: [&str; 2] = ["Yes", "No"];
const PHONE_ADDON: [&str; 3] = ["Yes", "No", "No phone service"];
const INTERNET_ADDON: [&str; 3] = ["Yes", "No", "No internet service"];
const GENDERS: [&str; 2] = ["Male", "Female"];
const INTERNET_SERVICES: [&str; 3] = ["DSL", "Fiber optic", "No"];
const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const PAYMENT_METHODS: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];

fn parse_bounded(raw: &str, max: f64) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if !(0.0..=max).contains(&value) {
        return Err(format!("must be between 0 and {max}"));
    }
    Ok(value)
}

fn monthly_charges(raw: &str) -> Result<f64, String> {
    parse_bounded(raw, 200.0)
}

fn total_charges(raw: &str) -> Result<f64, String> {
    parse_bounded(raw, 10_000.0)
}

#[derive(Debug, Clone, Args)]
pub struct CustomerForm {
    #[arg(long, default_value = "Male", value_parser = GENDERS)]
    pub gender: String,
    #[arg(long, default_value_t = 0, value_parser = value_parser!(i64).range(0..=1))]
    pub senior_citizen: i64,
    #[arg(long, default_value = "Yes", value_parser = YES_NO)]
    pub partner: String,
    #[arg(long, default_value = "Yes", value_parser = YES_NO)]
    pub dependents: String,
    /// Months as a customer
    #[arg(long, default_value_t = 12, value_parser = value_parser!(i64).range(0..=72))]
    pub tenure: i64,
    #[arg(long, default_value = "Yes", value_parser = YES_NO)]
    pub phone_service: String,
    #[arg(long, default_value = "Yes", value_parser = PHONE_ADDON)]
    pub multiple_lines: String,
    #[arg(long, default_value = "DSL", value_parser = INTERNET_SERVICES)]
    pub internet_service: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub online_security: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub online_backup: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub device_protection: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub tech_support: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub streaming_tv: String,
    #[arg(long, default_value = "Yes", value_parser = INTERNET_ADDON)]
    pub streaming_movies: String,
    #[arg(long, default_value = "Month-to-month", value_parser = CONTRACTS)]
    pub contract: String,
    #[arg(long, default_value = "Yes", value_parser = YES_NO)]
    pub paperless_billing: String,
    #[arg(long, default_value = "Electronic check", value_parser = PAYMENT_METHODS)]
    pub payment_method: String,
    #[arg(long, default_value_t = 70.0, value_parser = monthly_charges)]
    pub monthly_charges: f64,
    #[arg(long, default_value_t = 1000.0, value_parser = total_charges)]
    pub total_charges: f64,
}

impl From<CustomerForm> for CustomerRecord {
    fn from(form: CustomerForm) -> Self {
        CustomerRecord {
            gender: form.gender,
            senior_citizen: form.senior_citizen,
            partner: form.partner,
            dependents: form.dependents,
            tenure: form.tenure,
            phone_service: form.phone_service,
            multiple_lines: form.multiple_lines,
            internet_service: form.internet_service,
            online_security: form.online_security,
            online_backup: form.online_backup,
            device_protection: form.device_protection,
            tech_support: form.tech_support,
            streaming_tv: form.streaming_tv,
            streaming_movies: form.streaming_movies,
            contract: form.contract,
            paperless_billing: form.paperless_billing,
            payment_method: form.payment_method,
            monthly_charges: form.monthly_charges,
            total_charges: form.total_charges,
        }
    }
}
