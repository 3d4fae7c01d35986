//! Seed derivation.
//!
//! `seed = u32::from_be_bytes(sha256("{policy_unit_id}:{correlation_id}:{component}")[..4])`
//!
//! The derivation is versioned by [`SEED_VERSION`]; changing it changes every
//! seed the engine has ever recorded, so it must never change silently.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Version tag of the seed derivation algorithm.
pub const SEED_VERSION: &str = "sha256_v1";

/// Named consumers of randomness within one execution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedComponent {
    /// General-purpose sampling.
    Primary,
    /// Numeric routines (bootstrap, Monte Carlo).
    Numeric,
    Optimizer,
    Controller,
    MetaLearner,
}

impl SeedComponent {
    pub const ALL: [SeedComponent; 5] = [
        SeedComponent::Primary,
        SeedComponent::Numeric,
        SeedComponent::Optimizer,
        SeedComponent::Controller,
        SeedComponent::MetaLearner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeedComponent::Primary => "primary",
            SeedComponent::Numeric => "numeric",
            SeedComponent::Optimizer => "optimizer",
            SeedComponent::Controller => "controller",
            SeedComponent::MetaLearner => "meta_learner",
        }
    }
}

impl fmt::Display for SeedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First four bytes of the SHA-256 digest, big-endian.
pub fn derive_seed(material: &str) -> u32 {
    let digest = Sha256::digest(material.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Seed for a named component of an execution context.
pub fn component_seed(policy_unit_id: &str, correlation_id: &str, component: &str) -> u32 {
    derive_seed(&format!("{policy_unit_id}:{correlation_id}:{component}"))
}

/// Base seed of an execution context, derived from the canonical JSON
/// encoding of `["fixed", policy_unit_id, correlation_id]`.
pub fn base_seed(policy_unit_id: &str, correlation_id: &str) -> u32 {
    let material = serde_json::json!(["fixed", policy_unit_id, correlation_id]).to_string();
    derive_seed(&material)
}

/// Seeded generator for a seed. The only constructor of engine RNGs.
pub fn rng_from_seed(seed: u32) -> StdRng {
    StdRng::seed_from_u64(u64::from(seed))
}

/// The full seed set of one `(policy_unit_id, correlation_id)` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicSeeds {
    pub base: u32,
    pub primary: u32,
    pub numeric: u32,
    pub optimizer: u32,
    pub controller: u32,
    pub meta_learner: u32,
}

impl DeterministicSeeds {
    pub fn derive(policy_unit_id: &str, correlation_id: &str) -> Self {
        let seed = |c: SeedComponent| component_seed(policy_unit_id, correlation_id, c.as_str());
        Self {
            base: base_seed(policy_unit_id, correlation_id),
            primary: seed(SeedComponent::Primary),
            numeric: seed(SeedComponent::Numeric),
            optimizer: seed(SeedComponent::Optimizer),
            controller: seed(SeedComponent::Controller),
            meta_learner: seed(SeedComponent::MetaLearner),
        }
    }

    pub fn get(&self, component: SeedComponent) -> u32 {
        match component {
            SeedComponent::Primary => self.primary,
            SeedComponent::Numeric => self.numeric,
            SeedComponent::Optimizer => self.optimizer,
            SeedComponent::Controller => self.controller,
            SeedComponent::MetaLearner => self.meta_learner,
        }
    }

    /// Named seeds for the execution record.
    pub fn as_map(&self) -> BTreeMap<String, u32> {
        let mut map: BTreeMap<String, u32> = SeedComponent::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), self.get(*c)))
            .collect();
        map.insert("base".to_string(), self.base);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    #[test]
    fn seed_matches_reference_derivation() {
        // sha256("abc") = ba7816bf...
        assert_eq!(derive_seed("abc"), 0xba78_16bf);
    }

    #[test]
    fn component_seed_uses_colon_material() {
        assert_eq!(
            component_seed("plan_2024", "exec_001", "numeric"),
            derive_seed("plan_2024:exec_001:numeric")
        );
    }

    #[test]
    fn base_seed_uses_compact_json() {
        assert_eq!(
            base_seed("plan", "run"),
            derive_seed(r#"["fixed","plan","run"]"#)
        );
    }

    #[test]
    fn components_get_distinct_seeds() {
        let seeds = DeterministicSeeds::derive("plan_2024", "exec_001");
        let mut values: Vec<u32> = SeedComponent::ALL.iter().map(|c| seeds.get(*c)).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), SeedComponent::ALL.len());
        assert_eq!(seeds.as_map().len(), 6);
        assert_eq!(seeds.as_map()["meta_learner"], seeds.meta_learner);
    }

    #[test]
    fn rng_stream_depends_only_on_seed() {
        let mut a = rng_from_seed(7);
        let mut b = rng_from_seed(7);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
        assert_ne!(rng_from_seed(7).gen::<u64>(), rng_from_seed(8).gen::<u64>());
    }

    proptest! {
        #[test]
        fn derivation_is_reproducible(pu in "[a-z0-9_]{1,24}", corr in "[a-z0-9-]{1,24}") {
            prop_assert_eq!(
                DeterministicSeeds::derive(&pu, &corr),
                DeterministicSeeds::derive(&pu, &corr)
            );
        }
    }
}
