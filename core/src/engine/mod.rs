//! Batch ranking engine: transformer + scorer over a population.
//!
//! RULES:
//!   - The scorer is called exactly twice per record per ranked batch
//!     (once on the base record, once on its counterfactual).
//!   - Scores are paired with their source record by customer_id,
//!     never by position, so parallel scoring may reorder freely.
//!   - Any scoring failure fails the whole batch. No partial rankings.
//!   - The population is borrowed, never mutated.

mod recommend;
mod scenario;

pub use recommend::Recommendation;
pub use scenario::ScenarioSummary;

use crate::{
    action::ActionKind,
    cancel::CancelFlag,
    config::EngineConfig,
    counterfactual::Transform,
    error::{CfError, CfResult},
    record::{FeatureRecord, RiskDelta, ScoredRecord},
    scorer::{score_checked, ChurnScorer},
    types::{CustomerId, TimingDays, MAX_TOP_N, MIN_TOP_N},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

/// Single-customer counterfactual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerCounterfactual {
    pub customer_id: CustomerId,
    pub timing_days: TimingDays,
    pub action_type: ActionKind,
    #[serde(flatten)]
    pub risk:        RiskDelta,
}

pub struct CounterfactualEngine {
    default_top_n:           usize,
    parallel_min_population: usize,
    cancel:                  Option<CancelFlag>,
}

impl CounterfactualEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_top_n:           config.default_top_n,
            parallel_min_population: config.parallel_min_population.max(1),
            cancel:                  None,
        }
    }

    /// Make batches interruptible between scoring units.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Rank a population by annualised revenue preserved under one
    /// `(action, timing)` scenario.
    ///
    /// `top_n = None` uses the configured default.
    pub fn rank<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        timing_days: TimingDays,
        action_id: &str,
        scorer: &S,
        top_n: Option<usize>,
    ) -> CfResult<Vec<ScoredRecord>> {
        let action: ActionKind = action_id.parse()?;
        self.rank_action(population, timing_days, action, scorer, top_n)
    }

    pub fn rank_action<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        timing_days: TimingDays,
        action: ActionKind,
        scorer: &S,
        top_n: Option<usize>,
    ) -> CfResult<Vec<ScoredRecord>> {
        let top_n = top_n.unwrap_or(self.default_top_n);
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
            return Err(CfError::InvalidTopN { top_n, min: MIN_TOP_N, max: MAX_TOP_N });
        }
        let transform = Transform::new(timing_days, action)?;
        ensure_unique_ids(population)?;

        let scored = AtomicUsize::new(0);
        let base = self.score_all(population, scorer, &scored)?;
        let mut ranked = self.score_scenario(population, &base, &transform, scorer, &scored)?;
        sort_by_regret(&mut ranked);
        ranked.truncate(top_n);

        log::info!(
            "rank: action={action} timing={timing_days}d population={} returned={} saved_in_top={}",
            population.len(),
            ranked.len(),
            ranked.iter().filter(|r| r.saved).count(),
        );

        Ok(ranked)
    }

    /// Counterfactual for one customer looked up by id. No ranking, no truncation.
    pub fn counterfactual_for<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        customer_id: CustomerId,
        timing_days: TimingDays,
        action_id: &str,
        scorer: &S,
    ) -> CfResult<CustomerCounterfactual> {
        let action: ActionKind = action_id.parse()?;
        let transform = Transform::new(timing_days, action)?;
        let record = find_customer(population, customer_id)?;

        let base = score_checked(scorer, record)?;
        let counterfactual = score_checked(scorer, &transform.apply_one(record))?;
        let risk = RiskDelta::new(base, counterfactual);

        log::debug!(
            "counterfactual: customer={customer_id} action={action} timing={timing_days}d \
             base={base:.3} cf={counterfactual:.3} saved={}",
            risk.saved,
        );

        Ok(CustomerCounterfactual { customer_id, timing_days, action_type: action, risk })
    }

    /// Score the counterfactual population for one transform and join it
    /// with precomputed base scores. One scorer call per record.
    fn score_scenario<S: ChurnScorer + ?Sized>(
        &self,
        population: &[FeatureRecord],
        base: &HashMap<CustomerId, f64>,
        transform: &Transform,
        scorer: &S,
        scored: &AtomicUsize,
    ) -> CfResult<Vec<ScoredRecord>> {
        let cf_population: Vec<FeatureRecord> =
            population.iter().map(|r| transform.apply_one(r)).collect();
        let counterfactual = self.score_all(&cf_population, scorer, scored)?;

        population
            .iter()
            .map(|record| {
                let id = record.customer_id;
                let base_p = lookup(base, id)?;
                let cf_p = lookup(&counterfactual, id)?;
                Ok(ScoredRecord::new(record.clone(), base_p, cf_p))
            })
            .collect()
    }

    /// Score every record once, keyed by customer_id.
    ///
    /// Large populations are scored on the rayon pool. The cancel flag is
    /// checked before each scoring unit. `scored` counts calls across the
    /// whole operation, not just this pass.
    fn score_all<S: ChurnScorer + ?Sized>(
        &self,
        records: &[FeatureRecord],
        scorer: &S,
        scored: &AtomicUsize,
    ) -> CfResult<HashMap<CustomerId, f64>> {
        let score_one = |record: &FeatureRecord| -> CfResult<(CustomerId, f64)> {
            if let Some(flag) = &self.cancel {
                if flag.is_cancelled() {
                    return Err(CfError::Cancelled { scored: scored.load(AtomicOrdering::Relaxed) });
                }
            }
            let p = score_checked(scorer, record)?;
            scored.fetch_add(1, AtomicOrdering::Relaxed);
            Ok((record.customer_id, p))
        };

        let pairs: Vec<(CustomerId, f64)> = if records.len() >= self.parallel_min_population {
            log::debug!("score_all: scoring {} records in parallel", records.len());
            records.par_iter().map(score_one).collect::<CfResult<_>>()?
        } else {
            records.iter().map(score_one).collect::<CfResult<_>>()?
        };

        Ok(pairs.into_iter().collect())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Descending by regret_score, then by delta_risk. Stable, and total even
/// when a score is NaN.
pub fn sort_by_regret(records: &mut [ScoredRecord]) {
    records.sort_by(|a, b| {
        b.regret_score
            .total_cmp(&a.regret_score)
            .then_with(|| b.delta_risk.total_cmp(&a.delta_risk))
    });
}

fn ensure_unique_ids(population: &[FeatureRecord]) -> CfResult<()> {
    let mut seen = HashSet::with_capacity(population.len());
    for r in population {
        if !seen.insert(r.customer_id) {
            return Err(CfError::DuplicateCustomer { customer_id: r.customer_id });
        }
    }
    Ok(())
}

fn find_customer(population: &[FeatureRecord], customer_id: CustomerId) -> CfResult<&FeatureRecord> {
    population
        .iter()
        .find(|r| r.customer_id == customer_id)
        .ok_or(CfError::NotFound { customer_id })
}

fn lookup(scores: &HashMap<CustomerId, f64>, customer_id: CustomerId) -> CfResult<f64> {
    scores.get(&customer_id).copied().ok_or(CfError::NotFound { customer_id })
}
