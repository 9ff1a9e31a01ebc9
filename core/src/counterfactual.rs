//! Counterfactual transformer: "what would this customer look like had
//! we acted `timing_days` earlier with `action`".
//!
//! Pure: never mutates its input, never touches the scorer.
//! Identity whenever the action is `none` or the lead time is zero.

use crate::{
    action::{multiplier_for, ActionEffect, ActionKind},
    error::{CfError, CfResult},
    record::FeatureRecord,
    types::{TimingDays, MAX_TIMING_DAYS, USAGE_DROP_CREDIT},
};

/// Transform a batch of records under one `(action, timing)` pair.
///
/// String-keyed form for callers holding a raw action identifier.
pub fn apply(
    records: &[FeatureRecord],
    timing_days: TimingDays,
    action_id: &str,
) -> CfResult<Vec<FeatureRecord>> {
    let action: ActionKind = action_id.parse()?;
    apply_action(records, timing_days, action)
}

pub fn apply_action(
    records: &[FeatureRecord],
    timing_days: TimingDays,
    action: ActionKind,
) -> CfResult<Vec<FeatureRecord>> {
    let transform = Transform::new(timing_days, action)?;
    Ok(records.iter().map(|r| transform.apply_one(r)).collect())
}

/// A validated `(action, timing)` pair, ready to apply to any number of records.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub action:      ActionKind,
    pub timing_days: TimingDays,
    multiplier:      f64,
    effect:          ActionEffect,
}

impl Transform {
    pub fn new(timing_days: TimingDays, action: ActionKind) -> CfResult<Self> {
        if !(0..=MAX_TIMING_DAYS).contains(&timing_days) {
            return Err(CfError::InvalidTiming { days: timing_days, max: MAX_TIMING_DAYS });
        }
        let multiplier = multiplier_for(timing_days)?;
        let effect = action.effect();

        log::debug!(
            "counterfactual: action={action} timing={timing_days}d multiplier={multiplier:.2}"
        );

        Ok(Self { action, timing_days, multiplier, effect })
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn is_identity(&self) -> bool {
        self.multiplier == 0.0 || self.effect.is_noop()
    }

    /// Produce the counterfactual copy of one record.
    pub fn apply_one(&self, record: &FeatureRecord) -> FeatureRecord {
        if self.is_identity() {
            return record.clone();
        }

        let m = self.multiplier;
        let eff = &self.effect;

        FeatureRecord {
            sessions_30d: record.sessions_30d * (1.0 + eff.usage_boost * m),
            usage_drop_30d_pct: (record.usage_drop_30d_pct
                - eff.usage_boost * USAGE_DROP_CREDIT * m)
                .clamp(0.0, 100.0),
            tickets_30d: (record.tickets_30d * (1.0 - eff.ticket_reduction * m)).max(0.0),
            csat_30d: (record.csat_30d + eff.csat_boost * m).clamp(0.0, 1.0),
            failed_payments_90d: (record.failed_payments_90d * (1.0 - eff.payment_fix * m))
                .max(0.0),
            ..record.clone()
        }
    }
}
