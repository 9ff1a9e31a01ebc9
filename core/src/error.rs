use crate::types::{CustomerId, TimingDays};
use thiserror::Error;

/// Opaque failure raised by a scoring adapter.
///
/// The engine never interprets it; it is surfaced to the caller unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Scoring failed: {message}")]
pub struct ScoringError {
    pub message: String,
}

impl ScoringError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum CfError {
    #[error("Unknown action '{action}'")]
    UnknownAction { action: String },

    #[error("Invalid timing: {days} days (expected 0..={max})")]
    InvalidTiming { days: TimingDays, max: TimingDays },

    #[error("Invalid top_n: {top_n} (expected {min}..={max})")]
    InvalidTopN { top_n: usize, min: usize, max: usize },

    #[error("Customer {customer_id} not found")]
    NotFound { customer_id: CustomerId },

    #[error("Customer {customer_id} appears more than once in the population")]
    DuplicateCustomer { customer_id: CustomerId },

    #[error("Invalid record for customer {customer_id}: {reason}")]
    InvalidRecord { customer_id: CustomerId, reason: String },

    #[error("Batch cancelled after {scored} scoring calls")]
    Cancelled { scored: usize },

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CfResult<T> = Result<T, CfError>;
