//! Evidence Assembler & Validator for QCE
//!
//! [`assemble`] turns method outputs into an immutable [`EvidenceBundle`],
//! inserting outputs in `(priority, declaration)` order whatever order they
//! completed in. A later method never silently overwrites an earlier path:
//! arrays are appended, objects gain only new keys, and anything else keeps
//! the earlier value unless the contract marks the path overwritable. Every
//! such collision is recorded in the bundle's [`AssemblyTrace`].
//!
//! [`validate`] checks a bundle against the contract's expected evidence,
//! its per-field rules and the effective calibration. Rule violations are
//! diagnostics in a [`ValidationResult`]; only a structurally malformed
//! rule set is an error.

#![deny(unsafe_code)]

pub mod assembler;
pub mod bundle;
pub mod error;
pub mod merge;
pub mod validator;

pub use assembler::{assemble, MethodOutput};
pub use bundle::{
    AssemblyTrace, CollisionResolution, Conflict, Derivation, EvidenceBundle, Insertion,
};
pub use error::ValidationError;
pub use merge::merge_values;
pub use validator::{validate, validate_contract, Diagnostic, Severity, ValidationResult};
