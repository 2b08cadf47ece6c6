//! Reference host configuration

use serde::Deserialize;

use crate::error::HostResult;

/// Configuration for [`RefHost`](crate::RefHost)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// Maximum number of live heap objects.
    /// Default: unlimited
    pub max_objects: Option<usize>,

    /// Emit a trace event for every dup and free.
    /// Default: false
    pub trace_refcounts: bool,
}

impl HostConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON, e.g. `{"maxObjects": 64}`
    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Limit the number of live heap objects
    pub fn max_objects(mut self, limit: usize) -> Self {
        self.max_objects = Some(limit);
        self
    }

    /// Enable or disable refcount tracing
    pub fn trace_refcounts(mut self, enabled: bool) -> Self {
        self.trace_refcounts = enabled;
        self
    }
}
