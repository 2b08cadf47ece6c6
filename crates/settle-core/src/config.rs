//! Configuration for the settled promise factory.

use serde::{Deserialize, Serialize};

use crate::error::SettleResult;

/// What to do when a resolving function throws instead of settling
///
/// Either way the promise is dropped and an error is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolverFailurePolicy {
    /// Leave the host's exception pending for the caller.
    #[default]
    Propagate,
    /// Take and release the host's exception, logging a warning.
    Discard,
}

/// Factory configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettleConfig {
    /// Handling of resolving functions that throw.
    /// Default: propagate
    pub resolver_failure: ResolverFailurePolicy,
}

impl SettleConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON, e.g. `{"resolverFailure": "discard"}`.
    pub fn from_json(json: &str) -> SettleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the resolver failure policy.
    pub fn resolver_failure(mut self, policy: ResolverFailurePolicy) -> Self {
        self.resolver_failure = policy;
        self
    }
}
