//! Seed audit registry.
//!
//! Every seed handed out inside a scope is recorded once, so a run that
//! turns out non-deterministic can be diagnosed from its manifest.

use crate::seeds::{component_seed, SEED_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One generated seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub policy_unit_id: String,
    pub correlation_id: String,
    pub component: String,
    pub seed: u32,
    pub timestamp: DateTime<Utc>,
    pub seed_version: String,
}

/// Manifest entry summarising the seeds of one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedManifest {
    pub seed_version: String,
    pub seed_count: usize,
    pub policy_unit_id: Option<String>,
    pub correlation_id: Option<String>,
    pub seeds: BTreeMap<String, u32>,
}

/// Caching seed generator with an append-only audit log.
#[derive(Debug, Default)]
pub struct SeedRegistry {
    cache: HashMap<(String, String, String), u32>,
    audit_log: Vec<SeedRecord>,
}

impl SeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed for a component; the first request is recorded in the audit log.
    pub fn get_seed(&mut self, policy_unit_id: &str, correlation_id: &str, component: &str) -> u32 {
        let key = (
            policy_unit_id.to_string(),
            correlation_id.to_string(),
            component.to_string(),
        );
        if let Some(seed) = self.cache.get(&key) {
            return *seed;
        }

        let seed = component_seed(policy_unit_id, correlation_id, component);
        tracing::debug!(policy_unit_id, correlation_id, component, seed, "Generated seed");
        self.audit_log.push(SeedRecord {
            policy_unit_id: key.0.clone(),
            correlation_id: key.1.clone(),
            component: key.2.clone(),
            seed,
            timestamp: Utc::now(),
            seed_version: SEED_VERSION.to_string(),
        });
        self.cache.insert(key, seed);
        seed
    }

    pub fn audit_log(&self) -> &[SeedRecord] {
        &self.audit_log
    }

    /// Manifest of the audit log, optionally filtered by context.
    pub fn manifest(&self, policy_unit_id: Option<&str>, correlation_id: Option<&str>) -> SeedManifest {
        let records: Vec<&SeedRecord> = self
            .audit_log
            .iter()
            .filter(|r| policy_unit_id.map_or(true, |p| r.policy_unit_id == p))
            .filter(|r| correlation_id.map_or(true, |c| r.correlation_id == c))
            .collect();

        let first = records.first();
        SeedManifest {
            seed_version: SEED_VERSION.to_string(),
            seed_count: records.len(),
            policy_unit_id: first.map(|r| r.policy_unit_id.clone()),
            correlation_id: first.map(|r| r.correlation_id.clone()),
            seeds: records
                .iter()
                .map(|r| (r.component.clone(), r.seed))
                .collect(),
        }
    }
}
