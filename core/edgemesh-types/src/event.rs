//! Event types submitted to a node's intake surface.
//!
//! An event is the unit of replication: recording it updates the local
//! composite state and appends it to the hash chain. The core has no
//! knowledge of specific sensor/resource vocabularies beyond the
//! category and routing fields below.

use crate::{EventId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The semantic category an event is routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sensor,
    Resource,
    Infrastructure,
    General,
}

/// Optional operation hint, distinguishing add/remove or
/// increment/decrement within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Increment,
    Decrement,
    Add,
    Remove,
}

/// An event submitted to an edge node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Client-supplied or generated identifier.
    #[serde(default = "EventId::generate")]
    pub id: EventId,

    /// Short token naming the kind of reading, e.g. `"water_level"`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Arbitrary JSON scalar or container.
    pub value: serde_json::Value,

    /// Optional short location token, e.g. `"bridge_north"`.
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default = "Timestamp::now")]
    pub timestamp: Timestamp,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    pub category: Category,

    #[serde(default)]
    pub operation: Option<Operation>,
}

impl Event {
    /// Builds an event with the current timestamp and a generated id.
    #[must_use]
    pub fn new(event_type: impl Into<String>, value: serde_json::Value, category: Category) -> Self {
        Self {
            id: EventId::generate(),
            event_type: event_type.into(),
            value,
            location: None,
            timestamp: Timestamp::now(),
            metadata: HashMap::new(),
            category,
            operation: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// The node that will assign this event if it was never set
    /// explicitly; unused once the node stamps its own writer id into
    /// the routed sub-types. Present for symmetry with other builders.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
