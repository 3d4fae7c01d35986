use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier attached to every failure and execution record so
/// operators can correlate a log line with a method, question and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Generate a fresh event ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// Identifier of one multi-question run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run ID.
    pub fn generate() -> Self {
        Self(format!("run-{}", uuid::Uuid::new_v4()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an analysis method: the class it belongs to and its name.
///
/// Rendered as `Class.method`, the key format used by calibration files
/// and failure policies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    pub class_name: String,
    pub method_name: String,
}

impl MethodKey {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Parse a `Class.method` key. The split happens at the last dot so
    /// dotted class paths keep their namespace.
    pub fn parse(key: &str) -> Option<Self> {
        let (class_name, method_name) = key.rsplit_once('.')?;
        if class_name.is_empty() || method_name.is_empty() {
            return None;
        }
        Some(Self::new(class_name, method_name))
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}
