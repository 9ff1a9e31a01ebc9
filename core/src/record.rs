//! Customer feature records and their scored counterparts.

use crate::{
    error::{CfError, CfResult},
    types::{CustomerId, REGRET_MONTHS, SAVED_THRESHOLD},
};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

/// One customer's state as the classifier sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub customer_id:         CustomerId,
    pub tenure_months:       f64,
    pub arpu:                f64,
    pub sessions_30d:        f64,
    pub usage_drop_30d_pct:  f64,
    pub tickets_30d:         f64,
    pub csat_30d:            f64,
    pub failed_payments_90d: f64,
    pub plan_tier:           String,
    pub region:              String,
}

/// A record with its base and counterfactual risk attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record:                    FeatureRecord,
    pub churn_risk_base:           f64,
    pub churn_risk_counterfactual: f64,
    pub delta_risk:                f64,
    pub saved:                     bool,
    pub regret_score:              f64,
}

/// Single-customer result; no ranking key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskDelta {
    pub churn_risk_base:           f64,
    pub churn_risk_counterfactual: f64,
    pub delta_risk:                f64,
    pub saved:                     bool,
}

// ── Implementations ──────────────────────────────────────────────────────────

impl FeatureRecord {
    /// Check the data-model invariants.
    pub fn validate(&self) -> CfResult<()> {
        let fail = |reason: String| {
            Err(CfError::InvalidRecord { customer_id: self.customer_id, reason })
        };

        if self.customer_id == 0 {
            return fail("customer_id must be ≥ 1".into());
        }

        let numeric = [
            ("tenure_months",       self.tenure_months),
            ("arpu",                self.arpu),
            ("sessions_30d",        self.sessions_30d),
            ("usage_drop_30d_pct",  self.usage_drop_30d_pct),
            ("tickets_30d",         self.tickets_30d),
            ("csat_30d",            self.csat_30d),
            ("failed_payments_90d", self.failed_payments_90d),
        ];
        for (name, value) in numeric {
            if !value.is_finite() {
                return fail(format!("{name}={value} is not finite"));
            }
            if value < 0.0 {
                return fail(format!("{name}={value} must be ≥ 0"));
            }
        }

        if self.usage_drop_30d_pct > 100.0 {
            return fail(format!(
                "usage_drop_30d_pct={} must be in [0,100]",
                self.usage_drop_30d_pct
            ));
        }
        if self.csat_30d > 1.0 {
            return fail(format!("csat_30d={} must be in [0,1]", self.csat_30d));
        }
        Ok(())
    }
}

impl RiskDelta {
    pub fn new(base: f64, counterfactual: f64) -> Self {
        Self {
            churn_risk_base:           base,
            churn_risk_counterfactual: counterfactual,
            delta_risk:                base - counterfactual,
            saved:                     base >= SAVED_THRESHOLD && counterfactual < SAVED_THRESHOLD,
        }
    }
}

impl ScoredRecord {
    pub fn new(record: FeatureRecord, base: f64, counterfactual: f64) -> Self {
        let delta = RiskDelta::new(base, counterfactual);
        let regret_score = delta.delta_risk * record.arpu * REGRET_MONTHS;
        Self {
            record,
            churn_risk_base:           delta.churn_risk_base,
            churn_risk_counterfactual: delta.churn_risk_counterfactual,
            delta_risk:                delta.delta_risk,
            saved:                     delta.saved,
            regret_score,
        }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.record.customer_id
    }
}
