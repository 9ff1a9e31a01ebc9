//! Batch ranking engine: scoring contract, ordering, truncation, failures.

use retention_core::{
    CancelFlag, CfError, ChurnScorer, CounterfactualEngine, EngineConfig, FeatureRecord,
    LogitScorer, ScoringError,
};
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_engine() -> CounterfactualEngine {
    CounterfactualEngine::new(&EngineConfig::default_test())
}

fn make_parallel_engine() -> CounterfactualEngine {
    let mut config = EngineConfig::default_test();
    config.parallel_min_population = 1;
    CounterfactualEngine::new(&config)
}

/// Deterministic, varied population. Every field stays within its invariants.
fn make_population(n: u64) -> Vec<FeatureRecord> {
    let plans = ["basic", "standard", "premium"];
    let regions = ["na", "emea", "apac", "latam"];
    (0..n)
        .map(|i| FeatureRecord {
            customer_id:         1000 + i,
            tenure_months:       1.0 + (i * 7 % 60) as f64,
            arpu:                8.0 + (i * 13 % 80) as f64,
            sessions_30d:        (i * 11 % 40) as f64,
            usage_drop_30d_pct:  (i * 17 % 90) as f64,
            tickets_30d:         (i % 7) as f64,
            csat_30d:            0.2 + (i % 8) as f64 * 0.1,
            failed_payments_90d: (i % 4) as f64,
            plan_tier:           plans[(i % 3) as usize].into(),
            region:              regions[(i % 4) as usize].into(),
        })
        .collect()
}

/// Wraps another scorer and counts invocations.
struct CountingScorer<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S: ChurnScorer> CountingScorer<S> {
    fn new(inner: S) -> Self {
        Self { inner, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: ChurnScorer> ChurnScorer for CountingScorer<S> {
    fn score(&self, record: &FeatureRecord) -> Result<f64, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.score(record)
    }
}

/// Raises the cancel flag from inside its `after`-th call.
struct CancellingScorer {
    flag:  CancelFlag,
    after: usize,
    calls: AtomicUsize,
}

impl ChurnScorer for CancellingScorer {
    fn score(&self, record: &FeatureRecord) -> Result<f64, ScoringError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.flag.cancel();
        }
        LogitScorer::default().score(record)
    }
}

fn assert_sorted(rows: &[retention_core::ScoredRecord]) {
    for pair in rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.regret_score > b.regret_score
                || (a.regret_score == b.regret_score && a.delta_risk >= b.delta_risk),
            "Out of order: ({}, {}) before ({}, {})",
            a.regret_score, a.delta_risk, b.regret_score, b.delta_risk,
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// base 0.62 → counterfactual 0.41: delta 0.21, crosses the 0.5 line.
#[test]
fn threshold_crossing_marks_customer_saved() {
    init_logging();
    let mut population = make_population(1);
    population[0].sessions_30d = 10.0;
    // Only the untouched record scores 0.62; its counterfactual has 10.75 sessions.
    let scorer = |r: &FeatureRecord| -> Result<f64, ScoringError> {
        Ok(if r.sessions_30d == 10.0 { 0.62 } else { 0.41 })
    };

    let rows = make_engine()
        .rank(&population, 14, "discount", &scorer, None)
        .unwrap();

    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert_eq!(r.churn_risk_base, 0.62);
    assert_eq!(r.churn_risk_counterfactual, 0.41);
    assert!((r.delta_risk - 0.21).abs() < 1e-12, "delta_risk={}", r.delta_risk);
    assert!(r.saved, "0.62 → 0.41 must count as saved");
    assert!(
        (r.regret_score - r.delta_risk * r.record.arpu * 12.0).abs() < 1e-9,
        "regret_score={} must be delta × arpu × 12",
        r.regret_score
    );
}

#[test]
fn saved_requires_starting_at_or_above_threshold() {
    let population = vec![{
        let mut r = make_population(1).remove(0);
        r.sessions_30d = 10.0;
        r
    }];
    let scorer = |r: &FeatureRecord| -> Result<f64, ScoringError> {
        Ok(if r.sessions_30d == 10.0 { 0.49 } else { 0.10 })
    };

    let rows = make_engine().rank(&population, 30, "discount", &scorer, None).unwrap();
    assert!(!rows[0].saved, "a customer already below 0.5 cannot be saved");
    assert!(rows[0].delta_risk > 0.0);
}

/// The expensive classifier is hit exactly twice per record.
#[test]
fn scorer_called_exactly_twice_per_record() {
    let population = make_population(37);
    let scorer = CountingScorer::new(LogitScorer::default());

    make_engine().rank(&population, 14, "priority_support", &scorer, Some(5)).unwrap();
    assert_eq!(scorer.calls(), 74, "Expected 2 × 37 scorer calls");
}

/// Even an identity transform still scores the counterfactual side.
#[test]
fn scorer_called_twice_even_for_identity_transform() {
    let population = make_population(10);
    let scorer = CountingScorer::new(LogitScorer::default());

    let rows = make_engine().rank(&population, 0, "discount", &scorer, None).unwrap();
    assert_eq!(scorer.calls(), 20);
    assert!(rows.iter().all(|r| r.delta_risk == 0.0 && !r.saved));
}

#[test]
fn output_sorted_by_regret_then_delta() {
    let population = make_population(200);
    let rows = make_engine()
        .rank(&population, 30, "proactive_outreach", &LogitScorer::default(), Some(200))
        .unwrap();

    assert_eq!(rows.len(), 200);
    assert_sorted(&rows);
}

/// With equal regret (zero arpu), the larger risk reduction ranks first.
#[test]
fn delta_breaks_regret_ties() {
    let mut population = make_population(2);
    population[0].arpu = 0.0;
    population[0].sessions_30d = 10.0;
    population[1].arpu = 0.0;
    population[1].sessions_30d = 20.0;
    let scorer = |r: &FeatureRecord| -> Result<f64, ScoringError> {
        Ok((1.0 - r.sessions_30d / 50.0).clamp(0.0, 1.0))
    };

    let rows = make_engine().rank(&population, 60, "discount", &scorer, None).unwrap();

    assert_eq!(rows[0].regret_score, rows[1].regret_score);
    assert_eq!(rows[0].customer_id(), population[1].customer_id);
    assert!(rows[0].delta_risk > rows[1].delta_risk);
}

#[test]
fn output_length_is_min_of_top_n_and_population() {
    let population = make_population(12);
    let scorer = LogitScorer::default();
    let engine = make_engine();

    for (top_n, expected) in [(Some(5), 5), (Some(12), 12), (Some(100), 12), (None, 12)] {
        let rows = engine.rank(&population, 14, "discount", &scorer, top_n).unwrap();
        assert_eq!(rows.len(), expected, "top_n={top_n:?}");
    }

    let big = make_population(80);
    let rows = engine.rank(&big, 14, "discount", &scorer, None).unwrap();
    assert_eq!(rows.len(), 50, "default top_n is 50");
}

#[test]
fn empty_population_ranks_to_empty() {
    let rows = make_engine()
        .rank(&[], 14, "discount", &LogitScorer::default(), None)
        .unwrap();
    assert!(rows.is_empty());
}

/// Bad top_n fails before any scoring happens.
#[test]
fn top_n_outside_range_is_rejected() {
    let population = make_population(3);
    let scorer = CountingScorer::new(LogitScorer::default());

    for top_n in [0, 5001] {
        let err = make_engine()
            .rank(&population, 14, "discount", &scorer, Some(top_n))
            .unwrap_err();
        assert!(
            matches!(err, CfError::InvalidTopN { top_n: t, .. } if t == top_n),
            "top_n={top_n}: got {err:?}"
        );
    }
    assert_eq!(scorer.calls(), 0);

    assert!(make_engine().rank(&population, 14, "discount", &scorer, Some(5000)).is_ok());
}

#[test]
fn unknown_action_and_bad_timing_are_rejected() {
    let population = make_population(3);
    let scorer = LogitScorer::default();
    let engine = make_engine();

    let err = engine.rank(&population, 14, "bogus", &scorer, None).unwrap_err();
    assert!(matches!(err, CfError::UnknownAction { .. }), "got {err:?}");

    let err = engine.rank(&population, 61, "discount", &scorer, None).unwrap_err();
    assert!(matches!(err, CfError::InvalidTiming { days: 61, .. }), "got {err:?}");
}

/// One failing record fails the whole batch; the scorer's error is surfaced as-is.
#[test]
fn scorer_failure_aborts_batch() {
    let population = make_population(20);
    let scorer = |r: &FeatureRecord| -> Result<f64, ScoringError> {
        if r.customer_id == 1013 {
            Err(ScoringError::new("model unavailable"))
        } else {
            Ok(0.3)
        }
    };

    for engine in [make_engine(), make_parallel_engine()] {
        let err = engine.rank(&population, 14, "discount", &scorer, None).unwrap_err();
        match err {
            CfError::Scoring(e) => assert_eq!(e.message, "model unavailable"),
            other => panic!("Expected Scoring error, got {other:?}"),
        }
    }
}

#[test]
fn out_of_range_score_is_a_scoring_error() {
    let population = make_population(4);
    for bad in [1.5, -0.1, f64::NAN] {
        let scorer = move |_: &FeatureRecord| -> Result<f64, ScoringError> { Ok(bad) };
        let err = make_engine().rank(&population, 14, "discount", &scorer, None).unwrap_err();
        assert!(matches!(err, CfError::Scoring(_)), "score {bad}: got {err:?}");
    }
}

#[test]
fn duplicate_customer_ids_are_rejected() {
    let mut population = make_population(3);
    population[2].customer_id = population[0].customer_id;

    let err = make_engine()
        .rank(&population, 14, "discount", &LogitScorer::default(), None)
        .unwrap_err();
    assert!(
        matches!(err, CfError::DuplicateCustomer { customer_id } if customer_id == population[0].customer_id),
        "got {err:?}"
    );
}

#[test]
fn population_is_not_mutated() {
    let population = make_population(30);
    let before = population.clone();

    make_engine()
        .rank(&population, 60, "proactive_outreach", &LogitScorer::default(), None)
        .unwrap();
    assert_eq!(population, before);
}

/// Parallel scoring must pair scores by customer, giving the same ranking.
#[test]
fn parallel_and_sequential_rankings_agree() {
    init_logging();
    let population = make_population(300);
    let scorer = CountingScorer::new(LogitScorer::default());

    let sequential = make_engine()
        .rank(&population, 14, "priority_support", &LogitScorer::default(), Some(300))
        .unwrap();
    let parallel = make_parallel_engine()
        .rank(&population, 14, "priority_support", &scorer, Some(300))
        .unwrap();

    assert_eq!(scorer.calls(), 600);
    assert_eq!(sequential, parallel);
}

#[test]
fn concurrent_calls_are_independent() {
    let population = make_population(60);
    let engine = make_engine();
    let scorer = LogitScorer::default();
    let (engine, population, scorer) = (&engine, &population, &scorer);

    let expected = engine.rank(population, 30, "discount", scorer, Some(10)).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(move || engine.rank(population, 30, "discount", scorer, Some(10)).unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

#[test]
fn cancelled_batch_returns_no_rows() {
    let population = make_population(10);
    let flag = CancelFlag::new();
    let engine = make_engine().with_cancel(flag.clone());
    let scorer = CountingScorer::new(LogitScorer::default());

    flag.cancel();
    let err = engine.rank(&population, 14, "discount", &scorer, None).unwrap_err();
    assert!(matches!(err, CfError::Cancelled { scored: 0 }), "got {err:?}");
    assert_eq!(scorer.calls(), 0);
}

/// Cancelling during the counterfactual pass reports every call made so far,
/// base pass included.
#[test]
fn cancel_mid_batch_counts_all_scoring_calls() {
    let population = make_population(10);
    let flag = CancelFlag::new();
    let engine = make_engine().with_cancel(flag.clone());
    let scorer = CancellingScorer { flag, after: 12, calls: AtomicUsize::new(0) };

    let err = engine.rank(&population, 14, "discount", &scorer, None).unwrap_err();
    assert!(matches!(err, CfError::Cancelled { scored: 12 }), "got {err:?}");
    assert_eq!(err.to_string(), "Batch cancelled after 12 scoring calls");
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 12);
}

/// NaN regret (unvalidated arpu) must not break the ordering of the finite rows.
#[test]
fn nan_regret_keeps_finite_rows_sorted() {
    let mut population = make_population(64);
    for r in population.iter_mut().step_by(3) {
        r.arpu = f64::NAN;
    }
    let scorer = |r: &FeatureRecord| -> Result<f64, ScoringError> {
        Ok((1.0 - r.sessions_30d / 60.0).clamp(0.0, 1.0))
    };

    let rows = make_engine()
        .rank(&population, 30, "proactive_outreach", &scorer, Some(64))
        .unwrap();
    assert_eq!(rows.len(), 64);

    let finite: Vec<_> = rows.iter().filter(|r| r.regret_score.is_finite()).cloned().collect();
    assert_eq!(finite.len(), 64 - 22);
    assert_sorted(&finite);
}

// ── Single-customer form ─────────────────────────────────────────────────────

#[test]
fn single_customer_counterfactual_matches_batch_row() {
    let population = make_population(25);
    let scorer = LogitScorer::default();
    let engine = make_engine();

    let single = engine
        .counterfactual_for(&population, 1007, 30, "proactive_outreach", &scorer)
        .unwrap();
    let rows = engine
        .rank(&population, 30, "proactive_outreach", &scorer, Some(25))
        .unwrap();
    let row = rows.iter().find(|r| r.customer_id() == 1007).unwrap();

    assert_eq!(single.customer_id, 1007);
    assert_eq!(single.timing_days, 30);
    assert_eq!(single.risk.churn_risk_base, row.churn_risk_base);
    assert_eq!(single.risk.churn_risk_counterfactual, row.churn_risk_counterfactual);
    assert_eq!(single.risk.delta_risk, row.delta_risk);
    assert_eq!(single.risk.saved, row.saved);
}

#[test]
fn single_customer_scores_twice() {
    let population = make_population(25);
    let scorer = CountingScorer::new(LogitScorer::default());

    make_engine()
        .counterfactual_for(&population, 1003, 7, "discount", &scorer)
        .unwrap();
    assert_eq!(scorer.calls(), 2);
}

#[test]
fn single_customer_missing_is_not_found() {
    let population = make_population(5);
    let err = make_engine()
        .counterfactual_for(&population, 9999, 14, "discount", &LogitScorer::default())
        .unwrap_err();
    assert!(matches!(err, CfError::NotFound { customer_id: 9999 }), "got {err:?}");
}

#[test]
fn single_customer_serialises_flat() {
    let population = make_population(5);
    let result = make_engine()
        .counterfactual_for(&population, 1001, 14, "priority_support", &LogitScorer::default())
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["action_type"], "priority_support");
    assert!(json["churn_risk_base"].is_number());
    assert!(json["saved"].is_boolean());
}
