//! Promise handles that are already in a terminal state

use serde::{Deserialize, Serialize};
use settle_host::HostApi;
use std::fmt;

use crate::value::HostValue;

/// Terminal state a promise was driven to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Settlement {
    Fulfilled,
    Rejected,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfilled => f.write_str("fulfilled"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// An owned promise that was settled before it was handed out
pub struct SettledPromise<'h, H: HostApi + ?Sized> {
    promise: HostValue<'h, H>,
    settlement: Settlement,
}

impl<'h, H: HostApi + ?Sized> SettledPromise<'h, H> {
    pub(crate) fn new(promise: HostValue<'h, H>, settlement: Settlement) -> Self {
        Self {
            promise,
            settlement,
        }
    }

    /// How the promise was settled
    pub fn settlement(&self) -> Settlement {
        self.settlement
    }

    pub fn is_fulfilled(&self) -> bool {
        self.settlement == Settlement::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.settlement == Settlement::Rejected
    }

    /// Get the raw promise handle
    pub fn raw(&self) -> H::Value {
        self.promise.raw()
    }

    /// Borrow the promise as a value
    pub fn as_value(&self) -> &HostValue<'h, H> {
        &self.promise
    }

    /// Convert into the owned promise value
    pub fn into_value(self) -> HostValue<'h, H> {
        self.promise
    }

    /// Give the promise reference to the caller, e.g. to return it to script
    pub fn into_raw(self) -> H::Value {
        self.promise.into_raw()
    }
}

impl<H: HostApi + ?Sized> fmt::Debug for SettledPromise<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettledPromise")
            .field("promise", &self.promise)
            .field("settlement", &self.settlement)
            .finish()
    }
}
