//! Shared primitive types used across the engine.

/// Stable, unique customer key. Always ≥ 1.
pub type CustomerId = u64;

/// Lead time, in days, between taking an action and the original churn event.
///
/// Signed so that negative input can be represented and rejected.
pub type TimingDays = i64;

/// Longest lead time the engine accepts.
pub const MAX_TIMING_DAYS: TimingDays = 60;

/// Risk at or above which a customer counts as "going to churn".
/// Policy constant: changing it changes externally visible `saved` decisions.
pub const SAVED_THRESHOLD: f64 = 0.5;

/// Usage-drop percentage points credited per unit of usage boost.
/// Fixed policy constant, not derived from the model.
pub const USAGE_DROP_CREDIT: f64 = 20.0;

/// Months used to annualise the regret score.
pub const REGRET_MONTHS: f64 = 12.0;

pub const DEFAULT_TOP_N: usize = 50;
pub const MIN_TOP_N: usize = 1;
pub const MAX_TOP_N: usize = 5000;
