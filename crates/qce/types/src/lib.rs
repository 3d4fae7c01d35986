//! QCE Type System - shared vocabulary for the question contract engine
//!
//! Every component of the engine speaks in these types:
//!
//! - [`MethodKey`]: `(class_name, method_name)` identity of an analysis method
//! - [`EventId`] / [`RunId`]: stable identifiers used to correlate failures and runs
//! - [`PolicyArea`] / [`UnitOfAnalysis`]: question context classifications
//! - [`CalibrationParameters`]: validated operating parameters of one method invocation
//! - [`ExecutionRecord`]: per-question ledger entry consumed by the proof generator

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod calibration;
mod classification;
mod error;
mod identity;
mod record;

pub use calibration::*;
pub use classification::*;
pub use error::*;
pub use identity::*;
pub use record::*;
