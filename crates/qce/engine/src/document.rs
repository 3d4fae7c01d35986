//! Document context handed to every analysis method of a question.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// What the document provider exposes to methods.
///
/// Each field becomes a keyword argument: `document_text`, `chunk_ids`,
/// `prior_outputs`, plus every entry of `extra` under its own name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub document_text: String,
    pub chunk_ids: Vec<String>,
    /// Outputs of earlier phases, keyed by question or path.
    pub prior_outputs: BTreeMap<String, Value>,
    pub extra: Map<String, Value>,
}

impl DocumentContext {
    pub fn new(document_text: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            ..Self::default()
        }
    }

    pub fn with_chunks<I, S>(mut self, chunk_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunk_ids = chunk_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prior_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.prior_outputs.insert(key.into(), value);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Keyword arguments derived from the document, in insertion form.
    pub(crate) fn kwargs(&self) -> Vec<(String, Value)> {
        let mut kwargs = vec![
            ("document_text".to_string(), Value::from(self.document_text.as_str())),
            (
                "chunk_ids".to_string(),
                Value::from(self.chunk_ids.clone()),
            ),
        ];
        if !self.prior_outputs.is_empty() {
            let prior: Map<String, Value> = self
                .prior_outputs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            kwargs.push(("prior_outputs".to_string(), Value::Object(prior)));
        }
        kwargs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        kwargs
    }
}
