//! Retention counterfactual engine.
//!
//! Answers "what if we had acted N days earlier with action X" for every
//! customer in a population, and ranks customers by the annualised revenue
//! such an action would have preserved.
//!
//! Layering (leaf first):
//!   action          closed effect catalog and timing curve
//!   counterfactual  feature perturbation
//!   scorer          injected classifier boundary
//!   engine          batch ranking, single lookups, sweeps, recommendations

pub mod action;
pub mod cancel;
pub mod config;
pub mod counterfactual;
pub mod engine;
pub mod error;
pub mod population;
pub mod record;
pub mod scorer;
pub mod types;

pub use action::{effect_for, multiplier_for, ActionEffect, ActionKind};
pub use cancel::CancelFlag;
pub use config::EngineConfig;
pub use counterfactual::{apply, apply_action, Transform};
pub use engine::{CounterfactualEngine, CustomerCounterfactual, Recommendation, ScenarioSummary};
pub use error::{CfError, CfResult, ScoringError};
pub use population::Population;
pub use record::{FeatureRecord, RiskDelta, ScoredRecord};
pub use scorer::{predict, ChurnScorer, LogitCoefficients, LogitScorer};
