//! Effect catalog: the closed set of retention actions.
//!
//! Each action maps to a fixed quadruple of effect magnitudes, and lead
//! time maps to a damping multiplier via a step curve.
//!
//! RULE: Adding an action means adding an `ActionKind` variant. Every
//! lookup is an exhaustive match, so the compiler finds the gaps.

use crate::{
    error::{CfError, CfResult},
    types::TimingDays,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Magnitudes an action applies to a customer's behaviour, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionEffect {
    pub usage_boost:      f64,
    pub ticket_reduction: f64,
    pub csat_boost:       f64,
    pub payment_fix:      f64,
}

impl ActionEffect {
    pub const NONE: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(
        usage_boost: f64,
        ticket_reduction: f64,
        csat_boost: f64,
        payment_fix: f64,
    ) -> Self {
        Self { usage_boost, ticket_reduction, csat_boost, payment_fix }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::NONE
    }
}

/// Retention interventions.
/// The order here is the catalog order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    None,
    Discount,
    PrioritySupport,
    ProactiveOutreach,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::None,
        ActionKind::Discount,
        ActionKind::PrioritySupport,
        ActionKind::ProactiveOutreach,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::None              => "none",
            Self::Discount          => "discount",
            Self::PrioritySupport   => "priority_support",
            Self::ProactiveOutreach => "proactive_outreach",
        }
    }

    pub fn effect(&self) -> ActionEffect {
        match self {
            Self::None              => ActionEffect::NONE,
            Self::Discount          => ActionEffect::new(0.10, 0.05, 0.02, 0.02),
            Self::PrioritySupport   => ActionEffect::new(0.08, 0.20, 0.06, 0.01),
            Self::ProactiveOutreach => ActionEffect::new(0.15, 0.15, 0.08, 0.03),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = CfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| CfError::UnknownAction { action: s.to_string() })
    }
}

/// Look up the effect quadruple for an action identifier.
pub fn effect_for(action_id: &str) -> CfResult<ActionEffect> {
    Ok(action_id.parse::<ActionKind>()?.effect())
}

/// Damping factor for an action taken `timing_days` ahead of churn.
///
/// Step curve: no lead time gives no effect, and the effect saturates once
/// lead time exceeds one billing cycle.
pub fn multiplier_for(timing_days: TimingDays) -> CfResult<f64> {
    let m = match timing_days {
        d if d < 0 => {
            return Err(CfError::InvalidTiming {
                days: timing_days,
                max:  crate::types::MAX_TIMING_DAYS,
            })
        }
        0       => 0.0,
        1..=7   => 0.55,
        8..=14  => 0.75,
        15..=30 => 0.95,
        _       => 1.00,
    };
    Ok(m)
}
