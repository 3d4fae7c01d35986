//! Method Registry and Executor Adapter for QCE
//!
//! Analysis methods are registered under `(class_name, method_name)` keys
//! as typed [`AnalysisMethod`] handles. The registry is validated against
//! every contract at startup, so an unknown method fails before the first
//! question runs.
//!
//! [`ExecutorAdapter::execute`] classifies what can go wrong with one
//! invocation:
//!
//! - [`ExecutorFailure`]: the method failed. The original error stays
//!   reachable through [`std::error::Error::source`] and every failure
//!   carries an [`EventId`](qce_types::EventId).
//! - [`EnvironmentFatal`]: out of memory, interruption, or a raised abort
//!   signal. These are never wrapped as ordinary failures; they abort the
//!   run.

#![deny(unsafe_code)]

pub mod adapter;
pub mod error;
pub mod method;
pub mod registry;

pub use adapter::{ExecutorAdapter, DEFAULT_MAX_INPUT_BYTES};
pub use error::{EnvironmentFatal, ExecuteError, ExecutorFailure, FailureKind, FatalCause, MethodError};
pub use method::{AnalysisMethod, Kwargs};
pub use registry::{MethodLookup, MethodRegistry};
