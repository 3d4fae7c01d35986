//! Analysis method handles and their keyword arguments.

use crate::error::MethodError;
use qce_determinism::{rng_from_seed, StdRng};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keyword arguments of one method invocation.
///
/// Besides the named values, kwargs carry the seed the determinism scope
/// assigned to the method. Methods that need randomness build their
/// generator from it with [`Kwargs::rng`] and nothing else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    values: BTreeMap<String, Value>,
    seed: Option<u32>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    /// Generator seeded by the determinism scope, when one was assigned.
    pub fn rng(&self) -> Option<StdRng> {
        self.seed.map(rng_from_seed)
    }
}

impl FromIterator<(String, Value)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            seed: None,
        }
    }
}

/// A callable analysis method.
///
/// Any `Fn(&Kwargs) -> Result<Value, MethodError>` closure is a method.
pub trait AnalysisMethod: Send + Sync {
    fn call(&self, kwargs: &Kwargs) -> Result<Value, MethodError>;
}

impl<F> AnalysisMethod for F
where
    F: Fn(&Kwargs) -> Result<Value, MethodError> + Send + Sync,
{
    fn call(&self, kwargs: &Kwargs) -> Result<Value, MethodError> {
        self(kwargs)
    }
}
