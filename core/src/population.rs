//! Validated, in-memory customer population.
//!
//! The engine never reads files itself; callers materialise a population
//! here (or build the record slice however they like) and pass it in.

use crate::{
    error::{CfError, CfResult},
    record::FeatureRecord,
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PopulationFile {
    customers: Vec<FeatureRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Population {
    records: Vec<FeatureRecord>,
}

impl Population {
    /// Build a population, enforcing record invariants and unique ids.
    pub fn new(records: Vec<FeatureRecord>) -> CfResult<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !seen.insert(record.customer_id) {
                return Err(CfError::DuplicateCustomer { customer_id: record.customer_id });
            }
        }
        Ok(Self { records })
    }

    pub fn from_json(content: &str) -> CfResult<Self> {
        let file: PopulationFile = serde_json::from_str(content)?;
        Self::new(file.customers)
    }

    /// Load a `{"customers": [...]}` JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let population = Self::from_json(&content)
            .map_err(|e| anyhow::anyhow!("Cannot load population from {path}: {e}"))?;
        log::info!("population: loaded {} customers from {path}", population.len());
        Ok(population)
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Customer ids in population order.
    pub fn customer_ids(&self) -> Vec<CustomerId> {
        self.records.iter().map(|r| r.customer_id).collect()
    }

    pub fn get(&self, customer_id: CustomerId) -> CfResult<&FeatureRecord> {
        self.records
            .iter()
            .find(|r| r.customer_id == customer_id)
            .ok_or(CfError::NotFound { customer_id })
    }
}
