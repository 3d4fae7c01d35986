//! Failure taxonomy of method execution.

use qce_types::{EventId, MethodKey};
use std::error::Error;
use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// What an analysis method reports back.
#[derive(Debug, Error)]
pub enum MethodError {
    /// The method ran and failed.
    #[error("{0}")]
    Failed(BoxError),

    /// No method is registered under the key.
    #[error("no method registered as {0}")]
    Unknown(MethodKey),

    /// Memory was exhausted; the run cannot continue.
    #[error("out of memory")]
    OutOfMemory,

    /// Execution was explicitly interrupted.
    #[error("interrupted")]
    Interrupted,
}

impl MethodError {
    /// Wrap any error as an ordinary method failure.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }
}

/// Why a method invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MethodFailed,
    UnknownMethod,
    /// An argument exceeded the per-invocation size ceiling; the method
    /// was never called.
    InputTooLarge,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MethodFailed => "method failed",
            Self::UnknownMethod => "unknown method",
            Self::InputTooLarge => "input too large",
        })
    }
}

/// A recoverable method failure.
///
/// The original error is kept intact as [`Error::source`], so callers can
/// downcast to the concrete type the method raised.
#[derive(Debug)]
pub struct ExecutorFailure {
    pub event_id: EventId,
    pub method: MethodKey,
    pub kind: FailureKind,
    pub detail: String,
    source: Option<BoxError>,
}

impl ExecutorFailure {
    pub fn new(method: MethodKey, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            event_id: EventId::generate(),
            method,
            kind,
            detail: detail.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for ExecutorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} (event {}): {}",
            self.kind, self.method, self.event_id, self.detail
        )
    }
}

impl Error for ExecutorFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

/// Execution-environment condition that ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCause {
    OutOfMemory,
    Interrupted,
    /// The run's abort flag was raised.
    AbortSignal,
}

impl fmt::Display for FatalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OutOfMemory => "out of memory",
            Self::Interrupted => "interrupted",
            Self::AbortSignal => "abort signal raised",
        })
    }
}

/// Fatal condition raised while executing a method.
#[derive(Debug, Clone, Error)]
#[error("{cause} during {method} (event {event_id})")]
pub struct EnvironmentFatal {
    pub event_id: EventId,
    pub method: MethodKey,
    pub cause: FatalCause,
}

impl EnvironmentFatal {
    pub fn new(method: MethodKey, cause: FatalCause) -> Self {
        Self {
            event_id: EventId::generate(),
            method,
            cause,
        }
    }
}

/// Result of [`ExecutorAdapter::execute`](crate::ExecutorAdapter::execute).
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Failure(#[from] ExecutorFailure),

    #[error(transparent)]
    Fatal(#[from] EnvironmentFatal),
}

impl ExecuteError {
    pub fn event_id(&self) -> EventId {
        match self {
            Self::Failure(f) => f.event_id,
            Self::Fatal(f) => f.event_id,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("division by zero")]
    struct DivideByZero;

    #[test]
    fn failure_keeps_original_error_downcastable() {
        let failure = ExecutorFailure::new(MethodKey::new("Calc", "div"), FailureKind::MethodFailed, "boom")
            .with_source(Box::new(DivideByZero));

        let source = failure.source().unwrap();
        assert!(source.downcast_ref::<DivideByZero>().is_some());
        assert!(failure.to_string().starts_with("method failed in Calc.div (event evt-"));
    }

    #[test]
    fn execute_error_exposes_event_id() {
        let fatal = EnvironmentFatal::new(MethodKey::new("A", "b"), FatalCause::OutOfMemory);
        let id = fatal.event_id;
        let err = ExecuteError::from(fatal);
        assert!(err.is_fatal());
        assert_eq!(err.event_id(), id);
        assert!(err.to_string().starts_with("out of memory during A.b"));
    }

    #[test]
    fn method_error_wraps_strings() {
        let err = MethodError::failed("bad input");
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExecuteError>();
        assert_send_sync::<MethodError>();
    }
}
