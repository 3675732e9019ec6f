//! Record payloads moving through the pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single unit of data moving through the pipeline.
///
/// The payload is an opaque JSON value; interpreting it is the concern of
/// individual stages, not of the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of where this record originated
    source_id: String,

    /// The record payload
    value: Value,
}

impl Record {
    /// Create a new record with the given source id and payload
    pub fn new(source_id: impl Into<String>, value: Value) -> Self {
        Self {
            source_id: source_id.into(),
            value,
        }
    }

    /// Identifier of where this record originated
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The record payload
    pub fn value(&self) -> &Value {
        &self.value
    }
}
