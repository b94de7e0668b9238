//! Contract tests for the fitted pipeline as the service consumes it.

use churn_scoring::{
    metrics::decisions, round_report, ClassificationMetrics, ConfusionMatrix, CustomerRecord,
    EvaluationSet, FittedPipeline, Model, Node, PipelineMetadata, Preprocessor, Scorer, Threshold,
    Tree,
};
use tempfile::tempdir;

fn customers() -> Vec<CustomerRecord> {
    let contracts = ["Month-to-month", "One year", "Two year"];
    (0..30)
        .map(|i| {
            let mut record = CustomerRecord::sample();
            record.tenure = i * 2;
            record.monthly_charges = 20.0 + i as f64 * 3.5;
            record.total_charges = record.monthly_charges * record.tenure as f64;
            record.contract = contracts[i as usize % 3].into();
            record
        })
        .collect()
}

/// Short tenure and high charges push towards churn.
fn pipeline() -> FittedPipeline {
    let preprocessor = Preprocessor::fit(&customers()).unwrap();
    let trees = vec![
        Tree::new(vec![
            Node::internal(0, 1, 0.0, 1, 2),
            Node::leaf(1, 0.9),
            Node::leaf(2, -0.7),
        ]),
        Tree::new(vec![
            Node::internal(0, 2, 0.5, 1, 2),
            Node::leaf(1, -0.2),
            Node::leaf(2, 0.6),
        ]),
    ];
    FittedPipeline::new(preprocessor, Model::new(trees, -0.3), PipelineMetadata::now(30)).unwrap()
}

#[test]
fn scoring_is_deterministic() {
    let pipeline = pipeline();
    let record = CustomerRecord::sample();
    let first = pipeline.score(&record).unwrap();
    for _ in 0..10 {
        assert_eq!(pipeline.score(&record).unwrap(), first);
    }
}

#[test]
fn probabilities_stay_in_unit_interval() {
    let pipeline = pipeline();
    for p in pipeline.score_all(&customers()).unwrap() {
        assert!((0.0..=1.0).contains(&p), "probability {p} out of range");
    }
}

#[test]
fn unseen_category_still_scores() {
    let pipeline = pipeline();
    let mut record = CustomerRecord::sample();
    record.payment_method = "Cryptocurrency".into();
    let p = pipeline.score(&record).unwrap();
    assert!((0.0..=1.0).contains(&p));
}

#[test]
fn churn_decision_agrees_with_reported_probability() {
    let pipeline = pipeline();
    for t in [0.0, 0.1, 0.25, 0.4, 0.5, 0.66, 0.9, 1.0] {
        let threshold = Threshold::new(t).unwrap();
        for record in customers() {
            let reported = round_report(pipeline.score(&record).unwrap());
            assert_eq!(threshold.decide(reported), reported >= t);
        }
    }
}

#[test]
fn zero_and_one_thresholds_are_extremes() {
    let pipeline = pipeline();
    let probs = pipeline.score_all(&customers()).unwrap();
    assert!(decisions(&probs, Threshold::new(0.0).unwrap()).iter().all(|d| *d));

    let at_one = decisions(&probs, Threshold::new(1.0).unwrap());
    for (p, churn) in probs.iter().zip(&at_one) {
        if *p < 0.9995 {
            assert!(!churn, "p={p} flagged at threshold 1");
        }
    }
    assert!(probs.iter().any(|p| *p < 0.9995));
}

#[test]
fn metrics_match_manual_confusion_counts() {
    let pipeline = pipeline();
    let records = customers();
    let labels: Vec<u8> = records.iter().map(|r| (r.tenure < 20) as u8).collect();
    let probs = pipeline.score_all(&records).unwrap();
    let threshold = Threshold::new(0.5).unwrap();

    let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
    for (label, p) in labels.iter().zip(&probs) {
        match (*label == 1, round_report(*p) >= 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }
    let cm = ConfusionMatrix::from_decisions(&labels, &decisions(&probs, threshold));
    assert_eq!(cm, ConfusionMatrix { tp, tn, fp, fn_ });

    let m = ClassificationMetrics::compute(&labels, &probs, threshold).unwrap();
    let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
    let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
    assert_eq!(m.precision, round_report(precision));
    assert_eq!(m.recall, round_report(recall));
    assert_eq!(m.accuracy, round_report((tp + tn) as f64 / labels.len() as f64));
    assert!((0.0..=1.0).contains(&m.pr_auc));
}

#[test]
fn artifacts_roundtrip_through_model_dir() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline();
    pipeline.save(dir.path().join("churn_pipeline.json")).unwrap();

    let records = customers();
    let labels = records.iter().map(|r| (r.tenure % 3 == 0) as u8).collect();
    let set = EvaluationSet::new(records, labels).unwrap();
    set.write_csv(dir.path().join("test_set.csv")).unwrap();

    let loaded = FittedPipeline::load(dir.path().join("churn_pipeline.json")).unwrap();
    let loaded_set = EvaluationSet::from_csv(dir.path().join("test_set.csv")).unwrap();

    assert_eq!(
        loaded.score_all(loaded_set.records()).unwrap(),
        pipeline.score_all(set.records()).unwrap()
    );
}
