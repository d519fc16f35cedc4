//! Task descriptor: the only input the engine needs about a unit of work

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-text description of a task plus an open map of supplementary fields.
///
/// Every field defaults to empty, so a descriptor deserialized from `{}` is
/// valid and assesses as a single-criterion task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// One-line summary
    #[serde(default)]
    pub summary: String,

    /// Long-form description, usually containing acceptance criteria
    #[serde(default)]
    pub description: String,

    /// Supplementary fields keyed by name (e.g. a tracker's story-point field)
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl TaskDescriptor {
    /// Create a descriptor from summary and description
    pub fn new(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Create a descriptor from bare task text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(String::new(), text)
    }

    /// Add a supplementary field
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Summary and description joined by a space
    pub fn full_text(&self) -> String {
        format!("{} {}", self.summary, self.description)
    }
}
