//! End-to-end tests driving the router without a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use churn_rpc::{build_router, AppState};
use churn_scoring::{
    round_report, ClassificationMetrics, CustomerRecord, EvaluationSet, FittedPipeline, Model,
    Node, PipelineMetadata, Preprocessor, Result as ScoringResult, Scorer, ScoringError, Threshold,
    Tree,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn customers() -> Vec<CustomerRecord> {
    let contracts = ["Month-to-month", "One year", "Two year"];
    (0..24)
        .map(|i| {
            let mut record = CustomerRecord::sample();
            record.tenure = i * 3;
            record.monthly_charges = 25.0 + i as f64 * 4.0;
            record.total_charges = record.monthly_charges * record.tenure as f64;
            record.contract = contracts[i as usize % 3].into();
            record
        })
        .collect()
}

fn pipeline() -> FittedPipeline {
    let preprocessor = Preprocessor::fit(&customers()).unwrap();
    let trees = vec![
        Tree::new(vec![
            Node::internal(0, 1, 0.0, 1, 2),
            Node::leaf(1, 1.1),
            Node::leaf(2, -0.9),
        ]),
        Tree::new(vec![
            Node::internal(0, 2, 0.3, 1, 2),
            Node::leaf(1, -0.25),
            Node::leaf(2, 0.4),
        ]),
    ];
    FittedPipeline::new(preprocessor, Model::new(trees, -0.2), PipelineMetadata::now(24)).unwrap()
}

fn evaluation_set() -> EvaluationSet {
    let records = customers();
    let labels = records.iter().map(|r| (r.tenure < 30) as u8).collect();
    EvaluationSet::new(records, labels).unwrap()
}

fn app_with(evaluation: Option<EvaluationSet>) -> Router {
    build_router(Arc::new(AppState::new(Arc::new(pipeline()), evaluation)))
}

fn app() -> Router {
    app_with(Some(evaluation_set()))
}

/// The customer used by the service's smoke test.
fn literal_record() -> Value {
    json!({
        "gender": "Male",
        "SeniorCitizen": 0,
        "Partner": "Yes",
        "Dependents": "No",
        "tenure": 1,
        "PhoneService": "Yes",
        "MultipleLines": "No",
        "InternetService": "DSL",
        "OnlineSecurity": "No",
        "OnlineBackup": "No",
        "DeviceProtection": "No",
        "TechSupport": "No",
        "StreamingTV": "No",
        "StreamingMovies": "No",
        "Contract": "Month-to-month",
        "PaperlessBilling": "Yes",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": 50.0,
        "TotalCharges": 50.0
    })
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    send(app, req).await
}

async fn predict(app: Router, uri: &str, record: &Value) -> (StatusCode, Value) {
    post_json(app, uri, record.to_string()).await
}

fn assert_consistent(body: &Value) {
    let churn = body["churn"].as_bool().unwrap();
    let probability = body["probability"].as_f64().unwrap();
    let threshold = body["threshold"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    assert_eq!(probability, round_report(probability));
    assert_eq!(churn, probability >= threshold, "{body}");
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get(app_with(None), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn literal_record_scores_at_forty_percent() {
    let (status, body) = predict(app(), "/predict?threshold=0.40", &literal_record()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_object().unwrap().len(), 3);
    assert_eq!(body["threshold"], json!(0.4));
    assert_consistent(&body);
}

#[tokio::test]
async fn default_threshold_is_applied() {
    let (status, body) = predict(app(), "/predict", &literal_record()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["threshold"], json!(0.4));
}

#[tokio::test]
async fn predict_is_deterministic() {
    let (_, first) = predict(app(), "/predict?threshold=0.5", &literal_record()).await;
    let (_, second) = predict(app(), "/predict?threshold=0.5", &literal_record()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn churn_matches_probability_across_thresholds() {
    for t in ["0", "0.05", "0.2", "0.4", "0.45", "0.5", "0.75", "1"] {
        for record in customers() {
            let record = serde_json::to_value(record).unwrap();
            let (status, body) = predict(app(), &format!("/predict?threshold={t}"), &record).await;
            assert_eq!(status, StatusCode::OK);
            assert_consistent(&body);
        }
    }
}

#[tokio::test]
async fn extra_fields_are_ignored() {
    let mut record = literal_record();
    record["customerID"] = json!("7590-VHVEG");
    let (status, _) = predict(app(), "/predict", &record).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_field_is_rejected() {
    let mut record = literal_record();
    record.as_object_mut().unwrap().remove("TotalCharges");
    let (status, body) = predict(app(), "/predict", &record).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("TotalCharges"));
}

#[tokio::test]
async fn wrong_type_is_rejected() {
    let mut record = literal_record();
    record["tenure"] = json!("one");
    let (status, body) = predict(app(), "/predict", &record).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (status, body) = post_json(app(), "/predict", "{\"gender\": ".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_thresholds_are_rejected() {
    for uri in [
        "/predict?threshold=1.5",
        "/predict?threshold=-0.1",
        "/predict?threshold=abc",
        "/predict?threshold=NaN",
    ] {
        let (status, body) = predict(app(), uri, &literal_record()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(body["error"].is_string());
    }

    let (status, _) = get(app(), "/metrics?threshold=2").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn metrics_match_reference_computation() {
    let (status, body) = get(app(), "/metrics?threshold=0.4").await;
    assert_eq!(status, StatusCode::OK);

    let set = evaluation_set();
    let probabilities = pipeline().score_all(set.records()).unwrap();
    let expected =
        ClassificationMetrics::compute(set.labels(), &probabilities, Threshold::new(0.4).unwrap()).unwrap();
    assert_eq!(body, serde_json::to_value(expected).unwrap());

    for key in ["threshold", "precision", "recall", "f1_score", "accuracy", "pr_auc"] {
        assert!(body[key].is_number(), "missing {key}");
    }
}

#[tokio::test]
async fn metrics_use_default_threshold() {
    let (status, body) = get(app(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["threshold"], json!(0.4));
}

#[tokio::test]
async fn missing_evaluation_set_is_explicit() {
    let (status, body) = get(app_with(None), "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, body) = get(app_with(None), "/predict_proba_all").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn proba_all_returns_raw_probabilities_in_order() {
    let (status, body) = get(app(), "/predict_proba_all").await;
    assert_eq!(status, StatusCode::OK);

    let expected = pipeline().score_all(evaluation_set().records()).unwrap();
    let actual: Vec<f64> = serde_json::from_value(body).unwrap();
    assert_eq!(actual, expected);
}

struct FailingScorer;

impl Scorer for FailingScorer {
    fn score(&self, _record: &CustomerRecord) -> ScoringResult<f64> {
        Err(ScoringError::ScoringFailed("model unavailable".to_string()))
    }
}

#[tokio::test]
async fn bulk_scoring_failure_is_an_error_payload() {
    let state = AppState::new(Arc::new(FailingScorer), Some(evaluation_set()));
    let (status, body) = get(build_router(Arc::new(state)), "/predict_proba_all").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("model unavailable"));
}

#[tokio::test]
async fn load_requires_pipeline_but_not_test_set() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("churn_pipeline.json");
    let test_path = dir.path().join("test_set.csv");

    assert!(AppState::load(&model_path, &test_path).is_err());

    pipeline().save(&model_path).unwrap();
    let state = AppState::load(&model_path, &test_path).unwrap();
    assert!(state.evaluation.is_none());
    assert!(state.model_hash.is_some());

    evaluation_set().write_csv(&test_path).unwrap();
    let state = AppState::load(&model_path, &test_path).unwrap();
    assert_eq!(state.evaluation.as_ref().map(|e| e.len()), Some(24));
    state.warm_up();
}
