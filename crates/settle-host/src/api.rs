//! The host engine's C-style API surface

use std::fmt;

/// The `[resolve, reject]` pair returned with a new promise
pub type ResolvingFunctions<V> = [V; 2];

/// Embedding API of a single-threaded JavaScript engine context
///
/// Values are plain `Copy` handles. Every non-constant handle returned by a
/// method carries one reference that the caller must give back through
/// [`free_value`](HostApi::free_value). Handles passed as arguments are
/// borrowed.
///
/// Failing operations return the [`exception`](HostApi::exception) sentinel
/// and leave an exception pending in the context, to be collected with
/// [`take_exception`](HostApi::take_exception).
pub trait HostApi {
    /// Handle to an engine value
    type Value: Copy + fmt::Debug;

    /// The `undefined` constant
    fn undefined(&self) -> Self::Value;

    /// The `null` constant
    fn null(&self) -> Self::Value;

    /// A boolean constant
    fn boolean(&self, b: bool) -> Self::Value;

    /// The sentinel returned by failing operations
    fn exception(&self) -> Self::Value;

    /// Check whether a value is the exception sentinel
    fn is_exception(&self, value: Self::Value) -> bool;

    /// Create a pending promise together with its resolving functions
    ///
    /// On failure the promise slot holds the exception sentinel and the
    /// resolving function slots hold constants that need no release.
    fn new_promise_capability(&self) -> (Self::Value, ResolvingFunctions<Self::Value>);

    /// Call `func` with the given receiver and arguments
    fn call(&self, func: Self::Value, this: Self::Value, args: &[Self::Value]) -> Self::Value;

    /// Acquire an additional reference to a value
    fn dup_value(&self, value: Self::Value) -> Self::Value;

    /// Release one reference to a value
    fn free_value(&self, value: Self::Value);

    /// Take the pending exception, leaving none behind
    ///
    /// Returns `null` when no exception is pending.
    fn take_exception(&self) -> Self::Value;

    /// Describe the pending exception without taking it
    fn describe_exception(&self) -> Option<String>;
}
