//! Error types for promise settlement

use thiserror::Error;

use crate::promise::Settlement;

/// Result type alias for settlement operations
pub type SettleResult<T> = Result<T, SettleError>;

/// Errors that can occur while producing a settled promise
///
/// For the host-raised variants the message describes the host's exception.
/// That exception stays pending in the context unless a
/// [`Discard`](crate::ResolverFailurePolicy::Discard) policy released it.
#[derive(Debug, Error)]
pub enum SettleError {
    /// The host could not allocate the promise and its resolving functions
    #[error("Promise capability creation failed: {message}")]
    CapabilityCreation { message: String },

    /// A resolving function threw instead of settling the promise
    #[error("Resolving function threw while the promise was being {settlement}: {message}")]
    Settlement {
        settlement: Settlement,
        message: String,
        exception_pending: bool,
    },

    /// Invalid JSON configuration
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl SettleError {
    /// Create a capability creation error
    pub fn capability_creation(message: impl Into<String>) -> Self {
        Self::CapabilityCreation {
            message: message.into(),
        }
    }

    /// Create a settlement error
    pub fn settlement(
        settlement: Settlement,
        message: impl Into<String>,
        exception_pending: bool,
    ) -> Self {
        Self::Settlement {
            settlement,
            message: message.into(),
            exception_pending,
        }
    }

    /// Check if the host failed to create the promise capability
    pub fn is_capability_failure(&self) -> bool {
        matches!(self, Self::CapabilityCreation { .. })
    }

    /// Check if the host has an exception pending because of this error
    pub fn has_pending_exception(&self) -> bool {
        match self {
            Self::CapabilityCreation { .. } => true,
            Self::Settlement {
                exception_pending, ..
            } => *exception_pending,
            Self::Config(_) => false,
        }
    }

    /// Get the error type name
    pub fn error_type(&self) -> &str {
        match self {
            Self::CapabilityCreation { .. } => "CapabilityCreationError",
            Self::Settlement { .. } => "SettlementError",
            Self::Config(_) => "ConfigError",
        }
    }
}
