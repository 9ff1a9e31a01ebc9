//! Best-action recommendation for a single customer.

use super::{find_customer, CounterfactualEngine};
use crate::{
    action::ActionKind,
    counterfactual::Transform,
    error::CfResult,
    record::{FeatureRecord, RiskDelta},
    scorer::{score_checked, ChurnScorer},
    types::{CustomerId, TimingDays, SAVED_THRESHOLD},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub customer_id: CustomerId,
    pub base_risk:   f64,
    pub best_action: ActionKind,
    pub best_timing: TimingDays,
    pub new_risk:    f64,
    pub improvement: f64,
    pub reasoning:   String,
}

impl CounterfactualEngine {
    /// Try every action at every lead time in `timings` and keep the one that
    /// lowers risk the most. Ties keep the earlier candidate, in grid order
    /// and then catalog order.
    ///
    /// Falls back to `none` at timing 0 when nothing helps.
    pub fn recommend<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        customer_id: CustomerId,
        timings: &[TimingDays],
        scorer: &S,
    ) -> CfResult<Recommendation> {
        let candidates = timings
            .iter()
            .flat_map(|&t| {
                ActionKind::ALL
                    .into_iter()
                    .filter(|a| *a != ActionKind::None)
                    .map(move |a| (t, a))
            })
            .map(|(t, a)| Transform::new(t, a))
            .collect::<CfResult<Vec<_>>>()?;
        let record = find_customer(population, customer_id)?;

        let base_risk = score_checked(scorer, record)?;
        let mut best_action = ActionKind::None;
        let mut best_timing: TimingDays = 0;
        let mut new_risk = base_risk;

        for transform in &candidates {
            let risk = score_checked(scorer, &transform.apply_one(record))?;
            if risk < new_risk {
                best_action = transform.action;
                best_timing = transform.timing_days;
                new_risk = risk;
            }
        }

        let outcome = RiskDelta::new(base_risk, new_risk);
        let reasoning = explain(best_action, best_timing, &outcome);

        log::debug!("recommend: customer={customer_id} {reasoning}");

        Ok(Recommendation {
            customer_id,
            base_risk,
            best_action,
            best_timing,
            new_risk,
            improvement: outcome.delta_risk,
            reasoning,
        })
    }
}

fn explain(action: ActionKind, timing: TimingDays, outcome: &RiskDelta) -> String {
    if action == ActionKind::None {
        return format!(
            "No action in the grid lowers churn risk (currently {:.2}).",
            outcome.churn_risk_base
        );
    }

    let mut text = format!(
        "{action} {timing} days ahead lowers churn risk from {:.2} to {:.2} ({:.1} pts)",
        outcome.churn_risk_base,
        outcome.churn_risk_counterfactual,
        outcome.delta_risk * 100.0,
    );
    if outcome.saved {
        text.push_str(&format!(" and moves the customer below the {SAVED_THRESHOLD:.2} threshold"));
    }
    text.push('.');
    text
}
