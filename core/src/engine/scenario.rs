//! Scenario sweep: summarise every `(timing, action)` pair over a population.

use super::{ensure_unique_ids, CounterfactualEngine};
use crate::{
    action::ActionKind,
    counterfactual::Transform,
    error::CfResult,
    record::{FeatureRecord, ScoredRecord},
    scorer::ChurnScorer,
    types::TimingDays,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicUsize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub timing_days:     TimingDays,
    pub action_type:     ActionKind,
    pub customers:       usize,
    pub saved_count:     usize,
    pub mean_delta_risk: f64,
    pub total_regret:    f64,
}

impl ScenarioSummary {
    fn from_scored(transform: &Transform, scored: &[ScoredRecord]) -> Self {
        let customers = scored.len();
        let saved_count = scored.iter().filter(|r| r.saved).count();
        let total_delta: f64 = scored.iter().map(|r| r.delta_risk).sum();
        let total_regret: f64 = scored.iter().map(|r| r.regret_score).sum();
        let mean_delta_risk = if customers == 0 { 0.0 } else { total_delta / customers as f64 };

        Self {
            timing_days: transform.timing_days,
            action_type: transform.action,
            customers,
            saved_count,
            mean_delta_risk,
            total_regret,
        }
    }
}

impl CounterfactualEngine {
    /// Sweep the cartesian product of `timings` × `actions`.
    ///
    /// Base risk is scored once for the whole sweep; each scenario adds one
    /// scorer call per record. Every pair is validated before any scoring.
    pub fn scenario_sweep<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        timings: &[TimingDays],
        actions: &[ActionKind],
        scorer: &S,
    ) -> CfResult<Vec<ScenarioSummary>> {
        let transforms = timings
            .iter()
            .flat_map(|&t| actions.iter().map(move |&a| (t, a)))
            .map(|(t, a)| Transform::new(t, a))
            .collect::<CfResult<Vec<_>>>()?;
        if transforms.is_empty() {
            return Ok(Vec::new());
        }
        ensure_unique_ids(population)?;

        let calls = AtomicUsize::new(0);
        let base = self.score_all(population, scorer, &calls)?;

        let mut summaries = Vec::with_capacity(transforms.len());
        for transform in &transforms {
            let scored = self.score_scenario(population, &base, transform, scorer, &calls)?;
            let summary = ScenarioSummary::from_scored(transform, &scored);

            log::debug!(
                "scenario: action={} timing={}d saved={} mean_delta={:.4}",
                summary.action_type,
                summary.timing_days,
                summary.saved_count,
                summary.mean_delta_risk,
            );
            summaries.push(summary);
        }

        log::info!(
            "scenario_sweep: {} scenarios over {} customers",
            summaries.len(),
            population.len(),
        );
        Ok(summaries)
    }
}
