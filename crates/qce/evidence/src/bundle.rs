//! The assembled, immutable evidence bundle.

use qce_contracts::MergeStrategy;
use qce_types::MethodKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// What happened when a method output met an already populated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResolution {
    /// Path marked overwritable; the later value replaced the earlier one.
    Replaced,
    /// Both values were arrays; the later one was appended.
    Appended,
    /// Both values were objects; only new keys were added.
    Merged,
    /// Incompatible values; the earlier one was kept.
    KeptEarlier,
}

/// One method output placed into the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insertion {
    pub path: String,
    pub method: MethodKey,
    pub priority: i64,
    /// `None` when the path was empty before this output.
    pub collision: Option<CollisionResolution>,
}

/// A collision that did not end in plain replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    /// The later method whose output collided.
    pub method: MethodKey,
    pub resolution: CollisionResolution,
    /// Object keys both outputs defined; the earlier values were kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_keys: Vec<String>,
}

/// How a derived field was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub sources: Vec<String>,
    pub strategy: MergeStrategy,
    /// Source values that resolved, in source order.
    pub values: Vec<Value>,
}

/// Record of how the bundle was put together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyTrace {
    pub insertions: Vec<Insertion>,
    pub conflicts: Vec<Conflict>,
    pub derivations: BTreeMap<String, Derivation>,
}

/// Method outputs keyed by provides-path, plus derived fields.
///
/// Bundles are only built by [`assemble`](crate::assemble) and expose no
/// mutation, so a bundle handed to validation is the bundle that was
/// assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceBundle {
    question_id: String,
    values: BTreeMap<String, Value>,
    derived: BTreeMap<String, Value>,
    declared: BTreeSet<String>,
    trace: AssemblyTrace,
}

impl EvidenceBundle {
    pub(crate) fn new(
        question_id: String,
        values: BTreeMap<String, Value>,
        derived: BTreeMap<String, Value>,
        declared: BTreeSet<String>,
        trace: AssemblyTrace,
    ) -> Self {
        Self {
            question_id,
            values,
            derived,
            declared,
            trace,
        }
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    /// Resolve a dot path against method outputs, then derived fields.
    ///
    /// A path may reach inside an output: with `text` populated,
    /// `text.snippets.0` resolves into the stored JSON.
    pub fn get(&self, path: &str) -> Option<&Value> {
        resolve_in(&self.values, path).or_else(|| resolve_in(&self.derived, path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Populated provides-paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn derived(&self) -> &BTreeMap<String, Value> {
        &self.derived
    }

    pub fn trace(&self) -> &AssemblyTrace {
        &self.trace
    }

    /// Paths in the order outputs were inserted.
    pub fn insertion_order(&self) -> Vec<&str> {
        self.trace
            .insertions
            .iter()
            .map(|i| i.path.as_str())
            .collect()
    }

    /// Number of populated paths, derived fields included.
    pub fn len(&self) -> usize {
        self.values.len() + self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.derived.is_empty()
    }

    /// Whether the contract behind this bundle declares `path`, or a path
    /// above or below it.
    pub fn is_declared(&self, path: &str) -> bool {
        self.declared.iter().any(|declared| {
            declared == path || is_path_prefix(declared, path) || is_path_prefix(path, declared)
        })
    }

    pub fn declared_paths(&self) -> &BTreeSet<String> {
        &self.declared
    }
}

/// `prefix` is an ancestor of `path` at a segment boundary.
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'.'
}

/// Look `path` up in a map of dot-path keys, descending into JSON below the
/// longest matching key.
pub(crate) fn resolve_in<'a>(map: &'a BTreeMap<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(path) {
        return Some(value);
    }
    let (key, rest) = map
        .keys()
        .filter(|key| is_path_prefix(key, path))
        .max_by_key(|key| key.len())
        .map(|key| (key, &path[key.len() + 1..]))?;
    descend(map.get(key)?, rest)
}

fn descend<'a>(mut current: &'a Value, rest: &str) -> Option<&'a Value> {
    for segment in rest.split('.') {
        current = match current {
            Value::Object(object) => object.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
