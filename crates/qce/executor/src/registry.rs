//! Explicit method registry.

use crate::error::MethodError;
use crate::method::{AnalysisMethod, Kwargs};
use qce_types::{ConfigurationError, MethodKey};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Lookup service the executor dispatches through.
pub trait MethodLookup: Send + Sync {
    fn call(&self, class_name: &str, method_name: &str, kwargs: &Kwargs) -> Result<Value, MethodError>;

    fn contains(&self, class_name: &str, method_name: &str) -> bool;
}

/// Mapping from `(class_name, method_name)` to typed method handles.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<MethodKey, Arc<dyn AnalysisMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method, replacing any previous handle under the key.
    pub fn register(&mut self, key: MethodKey, method: impl AnalysisMethod + 'static) {
        if self.methods.insert(key.clone(), Arc::new(method)).is_some() {
            tracing::warn!(method = %key, "Replaced registered method");
        }
    }

    /// Register a closure as `class_name.method_name`.
    pub fn inject_fn<F>(&mut self, class_name: &str, method_name: &str, f: F)
    where
        F: Fn(&Kwargs) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.register(MethodKey::new(class_name, method_name), f);
    }

    pub fn get(&self, key: &MethodKey) -> Option<Arc<dyn AnalysisMethod>> {
        self.methods.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MethodKey> {
        self.methods.keys()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Fail when any of `required` has no registered handle.
    pub fn validate_against<'a>(
        &self,
        required: impl IntoIterator<Item = &'a MethodKey>,
    ) -> Result<(), ConfigurationError> {
        let unknown: BTreeSet<String> = required
            .into_iter()
            .filter(|key| !self.methods.contains_key(*key))
            .map(|key| key.to_string())
            .collect();
        if unknown.is_empty() {
            tracing::info!(methods = self.methods.len(), "Method registry validated");
            Ok(())
        } else {
            Err(ConfigurationError::UnknownMethods(unknown.into_iter().collect()))
        }
    }
}

impl MethodLookup for MethodRegistry {
    fn call(&self, class_name: &str, method_name: &str, kwargs: &Kwargs) -> Result<Value, MethodError> {
        let key = MethodKey::new(class_name, method_name);
        match self.methods.get(&key) {
            Some(method) => method.call(kwargs),
            None => Err(MethodError::Unknown(key)),
        }
    }

    fn contains(&self, class_name: &str, method_name: &str) -> bool {
        self.methods
            .contains_key(&MethodKey::new(class_name, method_name))
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.methods.keys()).finish()
    }
}
