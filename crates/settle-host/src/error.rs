//! Errors raised inside the reference host

use thiserror::Error;

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Failures inside the reference host
///
/// Allocation failures never cross the [`HostApi`](crate::HostApi)
/// boundary as Rust errors; they become pending script exceptions.
#[derive(Debug, Error)]
pub enum HostError {
    /// The configured object limit was reached
    #[error("Object limit of {limit} reached")]
    ObjectLimit { limit: usize },

    /// Every slot index the heap can address is in use
    #[error("Heap slot indices exhausted")]
    SlotsExhausted,

    /// A fault was injected by a test
    #[error("Injected fault: {0}")]
    Injected(&'static str),

    /// Invalid host configuration
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl HostError {
    /// Name of the script error this failure is reported as
    ///
    /// Every host-side failure surfaces to scripts as an `InternalError`.
    pub fn error_name(&self) -> &'static str {
        "InternalError"
    }

    /// Message of the script error this failure is reported as
    pub fn script_message(&self) -> String {
        match self {
            Self::ObjectLimit { .. } | Self::SlotsExhausted => "out of memory".to_string(),
            other => other.to_string(),
        }
    }
}
