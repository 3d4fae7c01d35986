//! Determinism Context for QCE
//!
//! Every randomized operation inside a question's execution draws from
//! seeds owned by a single [`DeterminismScope`]. Seeds are derived with
//! SHA-256 from `(policy_unit_id, correlation_id)`, so re-entering with the
//! same pair reproduces bit-identical values across processes.
//!
//! There is no process-wide random state. Callers get explicit
//! [`StdRng`] handles from the scope:
//!
//! ```rust
//! use qce_determinism::{DeterminismContext, SeedComponent};
//! use rand::Rng;
//!
//! let draw = || {
//!     let scope = DeterminismContext::enter("plan_2024", "exec_001").unwrap();
//!     scope.rng(SeedComponent::Numeric).gen::<u64>()
//! };
//! assert_eq!(draw(), draw());
//! ```

#![deny(unsafe_code)]

pub mod error;
pub mod registry;
pub mod scope;
pub mod seeds;

pub use error::{DeterminismError, DeterminismResult};
pub use registry::{SeedManifest, SeedRecord, SeedRegistry};
pub use scope::{DeterminismContext, DeterminismScope};
pub use seeds::{base_seed, component_seed, derive_seed, rng_from_seed, DeterministicSeeds, SeedComponent, SEED_VERSION};

pub use rand::rngs::StdRng;
