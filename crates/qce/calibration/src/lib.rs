//! Calibration Resolver for QCE
//!
//! Produces the effective [`CalibrationParameters`] for one method invocation:
//!
//! 1. [`CalibrationRegistry`] answers the base calibration for a method,
//!    distinguishing uncalibrated methods from calibrated ones
//!    ([`MethodCalibration`]).
//! 2. [`infer_context`] derives a [`CalibrationContext`] from a question id.
//! 3. [`CalibrationResolver::resolve_contextual`] applies the dimension,
//!    policy-area, unit-of-analysis and method-position modifiers in that
//!    order, clamping after every step.
//!
//! # Example
//!
//! ```rust
//! use qce_calibration::{infer_context, CalibrationRegistry, CalibrationResolver};
//! use qce_types::PolicyArea;
//!
//! let resolver = CalibrationResolver::new(CalibrationRegistry::new());
//! let base = resolver.resolve_base("TextMiningEngine", "diagnose_critical_links");
//! let context = infer_context("D1Q1").with_policy_area(PolicyArea::Fiscal);
//! let effective = resolver.resolve_contextual(&base, &context);
//!
//! assert!(effective.min_evidence_snippets() >= base.min_evidence_snippets());
//! assert!(effective.is_within_bounds());
//! ```

#![deny(unsafe_code)]

pub mod context;
pub mod modifier;
pub mod registry;
pub mod resolver;

pub use context::{infer_context, CalibrationContext};
pub use modifier::CalibrationModifier;
pub use registry::{CalibrationRegistry, MethodCalibration};
pub use resolver::CalibrationResolver;

pub use qce_types::{CalibrationParameters, CalibrationParts};
