//! Value handles used by the reference host

use serde::Serialize;
use std::fmt;

/// Heap slot index plus the generation the slot had when allocated
///
/// A reused slot gets a new generation, so stale ids never alias a newer
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjectId {
    /// Raw slot index
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A tagged value handle
///
/// Only [`RawValue::Object`] is reference counted. Releasing any other
/// variant is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RawValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Object(ObjectId),
    /// Returned by failing operations
    Exception,
}

impl RawValue {
    /// Heap slot referenced by this value, if any
    pub fn object_id(self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(id),
            _ => None,
        }
    }

    /// Check if this value is reference counted
    pub fn is_object(self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Check if this value is the exception sentinel
    pub fn is_exception(self) -> bool {
        matches!(self, Self::Exception)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        Self::Int(n)
    }
}

/// Settlement state of a promise object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum PromiseState {
    Pending,
    Fulfilled(RawValue),
    Rejected(RawValue),
}

impl PromiseState {
    /// Check if the promise has left the pending state
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The fulfillment or rejection payload
    pub fn payload(&self) -> Option<RawValue> {
        match self {
            Self::Pending => None,
            Self::Fulfilled(v) | Self::Rejected(v) => Some(*v),
        }
    }
}
