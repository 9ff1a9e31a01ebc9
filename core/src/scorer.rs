//! Scoring adapter boundary.
//!
//! The engine never trains or loads a model. Callers inject anything that
//! implements `ChurnScorer`; closures work out of the box.

use crate::{
    error::{CfResult, ScoringError},
    record::FeatureRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The contract every churn classifier must fulfill.
///
/// - deterministic for a fixed model
/// - must not mutate its input
/// - returns a probability in [0, 1]
pub trait ChurnScorer: Sync {
    fn score(&self, record: &FeatureRecord) -> Result<f64, ScoringError>;
}

impl<F> ChurnScorer for F
where
    F: Fn(&FeatureRecord) -> Result<f64, ScoringError> + Sync,
{
    fn score(&self, record: &FeatureRecord) -> Result<f64, ScoringError> {
        self(record)
    }
}

/// Score one record, rejecting values outside [0, 1].
pub fn score_checked<S: ChurnScorer + ?Sized>(scorer: &S, record: &FeatureRecord) -> CfResult<f64> {
    let p = scorer.score(record)?;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ScoringError::new(format!(
            "scorer returned {p} for customer {}; expected a probability in [0,1]",
            record.customer_id
        ))
        .into());
    }
    Ok(p)
}

/// Single-record churn risk.
pub fn predict<S: ChurnScorer + ?Sized>(scorer: &S, record: &FeatureRecord) -> CfResult<f64> {
    score_checked(scorer, record)
}

// ── Reference logistic scorer ────────────────────────────────────────────────

/// Coefficients of the logistic churn formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogitCoefficients {
    pub intercept:             f64,
    pub scale:                 f64,
    pub usage_drop_weight:     f64,
    pub tickets_weight:        f64,
    pub csat_weight:           f64,
    pub csat_equilibrium:      f64,
    pub failed_payment_weight: f64,
    pub sessions_weight:       f64,
    pub tenure_weight:         f64,
    pub arpu_weight:           f64,
    pub plan_offsets:          HashMap<String, f64>,
    pub region_offsets:        HashMap<String, f64>,
}

impl Default for LogitCoefficients {
    fn default() -> Self {
        let plan_offsets = [("basic", 0.22), ("standard", 0.05), ("premium", -0.08)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let region_offsets = [("na", 0.00), ("emea", 0.04), ("apac", 0.03), ("latam", 0.08)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            intercept:             -1.15,
            scale:                 0.55,
            usage_drop_weight:     0.028,
            tickets_weight:        0.55,
            csat_weight:           1.2,
            csat_equilibrium:      0.85,
            failed_payment_weight: 0.60,
            sessions_weight:       -0.020,
            tenure_weight:         -0.010,
            arpu_weight:           0.012,
            plan_offsets,
            region_offsets,
        }
    }
}

/// Fixed-coefficient logistic classifier.
///
/// Stand-in for a trained model in the runner and in tests. Unknown
/// categorical values contribute nothing.
#[derive(Debug, Clone, Default)]
pub struct LogitScorer {
    coefficients: LogitCoefficients,
}

impl LogitScorer {
    pub fn new(coefficients: LogitCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &LogitCoefficients {
        &self.coefficients
    }

    fn linear_term(&self, r: &FeatureRecord) -> f64 {
        let c = &self.coefficients;
        let csat_gap = (c.csat_equilibrium - r.csat_30d).max(0.0);

        c.usage_drop_weight * r.usage_drop_30d_pct
            + c.tickets_weight * r.tickets_30d
            + c.csat_weight * csat_gap
            + c.failed_payment_weight * r.failed_payments_90d
            + c.sessions_weight * r.sessions_30d
            + c.tenure_weight * r.tenure_months
            + c.arpu_weight * r.arpu
            + c.plan_offsets.get(&r.plan_tier).copied().unwrap_or(0.0)
            + c.region_offsets.get(&r.region).copied().unwrap_or(0.0)
    }
}

impl ChurnScorer for LogitScorer {
    fn score(&self, record: &FeatureRecord) -> Result<f64, ScoringError> {
        let z = self.coefficients.intercept + self.linear_term(record) * self.coefficients.scale;
        let p = 1.0 / (1.0 + (-z).exp());
        if p.is_nan() {
            return Err(ScoringError::new(format!(
                "non-numeric features for customer {}",
                record.customer_id
            )));
        }
        Ok(p)
    }
}
