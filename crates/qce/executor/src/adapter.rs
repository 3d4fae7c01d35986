//! Executor adapter: bounded, classified method invocation.

use crate::error::{EnvironmentFatal, ExecuteError, ExecutorFailure, FailureKind, FatalCause, MethodError};
use crate::method::Kwargs;
use crate::registry::MethodLookup;
use qce_types::MethodKey;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-argument size ceiling: 8 MiB of serialized JSON.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 8 * 1024 * 1024;

/// Invokes methods through a [`MethodLookup`] and classifies the outcome.
#[derive(Clone)]
pub struct ExecutorAdapter {
    lookup: Arc<dyn MethodLookup>,
    max_input_bytes: usize,
    abort: Arc<AtomicBool>,
}

impl ExecutorAdapter {
    pub fn new(lookup: Arc<dyn MethodLookup>) -> Self {
        Self {
            lookup,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    /// Share the run's abort flag with this adapter.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }

    pub fn lookup(&self) -> &dyn MethodLookup {
        self.lookup.as_ref()
    }

    /// Execute `class_name.method_name` with `kwargs`.
    ///
    /// Ordinary failures come back as [`ExecuteError::Failure`].
    /// Out-of-memory, interruption and a raised abort flag come back as
    /// [`ExecuteError::Fatal`] and raise the abort flag for the rest of the
    /// run.
    pub fn execute(&self, class_name: &str, method_name: &str, kwargs: &Kwargs) -> Result<Value, ExecuteError> {
        let key = MethodKey::new(class_name, method_name);

        if self.abort.load(Ordering::SeqCst) {
            return Err(self.fatal(key, FatalCause::AbortSignal).into());
        }

        if let Some((name, size)) = self.oversized_argument(kwargs) {
            let failure = ExecutorFailure::new(
                key,
                FailureKind::InputTooLarge,
                format!(
                    "argument {name} is {size} bytes, ceiling is {} bytes",
                    self.max_input_bytes
                ),
            );
            tracing::warn!(
                class_name,
                method_name,
                argument = %name,
                size,
                event_id = %failure.event_id,
                "Skipping invocation with oversized input"
            );
            return Err(failure.into());
        }

        let result = self.lookup.call(class_name, method_name, kwargs);

        if self.abort.load(Ordering::SeqCst) {
            return Err(self.fatal(key, FatalCause::AbortSignal).into());
        }

        match result {
            Ok(value) => Ok(value),
            Err(MethodError::OutOfMemory) => Err(self.fatal(key, FatalCause::OutOfMemory).into()),
            Err(MethodError::Interrupted) => Err(self.fatal(key, FatalCause::Interrupted).into()),
            Err(MethodError::Unknown(key)) => {
                let failure = ExecutorFailure::new(key, FailureKind::UnknownMethod, "no registered handle");
                tracing::error!(class_name, method_name, event_id = %failure.event_id, "Unknown method");
                Err(failure.into())
            }
            Err(MethodError::Failed(source)) => {
                let failure = ExecutorFailure::new(key, FailureKind::MethodFailed, source.to_string())
                    .with_source(source);
                tracing::error!(
                    class_name,
                    method_name,
                    event_id = %failure.event_id,
                    error = %failure.detail,
                    "Method failed"
                );
                Err(failure.into())
            }
        }
    }

    fn fatal(&self, key: MethodKey, cause: FatalCause) -> EnvironmentFatal {
        self.abort.store(true, Ordering::SeqCst);
        let fatal = EnvironmentFatal::new(key, cause);
        tracing::error!(
            method = %fatal.method,
            cause = %fatal.cause,
            event_id = %fatal.event_id,
            "Fatal execution condition, aborting run"
        );
        fatal
    }

    /// First argument whose serialized size exceeds the ceiling.
    fn oversized_argument(&self, kwargs: &Kwargs) -> Option<(String, usize)> {
        kwargs.iter().find_map(|(name, value)| {
            let size = serialized_size(value);
            (size > self.max_input_bytes).then(|| (name.clone(), size))
        })
    }
}

impl std::fmt::Debug for ExecutorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorAdapter")
            .field("max_input_bytes", &self.max_input_bytes)
            .field("aborted", &self.abort.load(Ordering::SeqCst))
            .finish()
    }
}

/// Serialized JSON length without materialising the bytes.
fn serialized_size(value: &Value) -> usize {
    struct Counter(usize);

    impl io::Write for Counter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0 += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let mut counter = Counter(0);
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        // Serializing a Value into an infallible writer cannot fail.
        Err(_) => usize::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodRegistry;
    use serde_json::json;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("table has no header row")]
    struct MissingHeader;

    fn adapter() -> ExecutorAdapter {
        let mut registry = MethodRegistry::new();
        registry.inject_fn("Echo", "run", |kwargs| Ok(json!(kwargs.len())));
        registry.inject_fn("Table", "parse", |_| Err(MethodError::failed(MissingHeader)));
        registry.inject_fn("Model", "fit", |_| Err(MethodError::OutOfMemory));
        registry.inject_fn("Model", "stop", |_| Err(MethodError::Interrupted));
        ExecutorAdapter::new(Arc::new(registry))
    }

    #[test]
    fn successful_call_returns_value() {
        let out = adapter()
            .execute("Echo", "run", &Kwargs::new().with("a", 1))
            .unwrap();
        assert_eq!(out, json!(1));
    }

    #[test]
    fn method_failure_preserves_cause() {
        let err = adapter().execute("Table", "parse", &Kwargs::new()).unwrap_err();
        let ExecuteError::Failure(failure) = err else {
            panic!("expected a failure");
        };
        assert_eq!(failure.kind, FailureKind::MethodFailed);
        assert!(failure.source().unwrap().downcast_ref::<MissingHeader>().is_some());
        assert_eq!(failure.detail, "table has no header row");
    }

    #[test]
    fn unknown_method_is_a_failure() {
        let err = adapter().execute("Ghost", "walk", &Kwargs::new()).unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Failure(ExecutorFailure { kind: FailureKind::UnknownMethod, .. })
        ));
    }

    #[test]
    fn out_of_memory_is_fatal_and_raises_abort() {
        let adapter = adapter();
        let err = adapter.execute("Model", "fit", &Kwargs::new()).unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Fatal(EnvironmentFatal { cause: FatalCause::OutOfMemory, .. })
        ));
        assert!(adapter.abort_flag().load(Ordering::SeqCst));

        // Every later call is refused.
        let err = adapter.execute("Echo", "run", &Kwargs::new()).unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Fatal(EnvironmentFatal { cause: FatalCause::AbortSignal, .. })
        ));
    }

    #[test]
    fn interruption_is_fatal() {
        let err = adapter().execute("Model", "stop", &Kwargs::new()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn oversized_argument_is_skipped() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut registry = MethodRegistry::new();
        registry.inject_fn("Echo", "run", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        let adapter = ExecutorAdapter::new(Arc::new(registry)).with_max_input_bytes(16);

        let kwargs = Kwargs::new()
            .with("small", "ok")
            .with("document", "x".repeat(64));
        let err = adapter.execute("Echo", "run", &kwargs).unwrap_err();
        match err {
            ExecuteError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::InputTooLarge);
                assert!(failure.detail.starts_with("argument document is 66 bytes"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!adapter.abort_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn serialized_size_matches_to_vec() {
        let value = json!({"a": [1, 2, 3], "b": "text"});
        assert_eq!(serialized_size(&value), serde_json::to_vec(&value).unwrap().len());
    }
}
