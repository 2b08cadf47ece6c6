//! Owned host value handles with automatic release

use settle_host::HostApi;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;

/// A host value that owns exactly one reference
///
/// The reference is released when the handle is dropped. Cloning acquires a
/// second reference through the host.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync` because host values are tied to their
/// context's thread.
pub struct HostValue<'h, H: HostApi + ?Sized> {
    host: &'h H,
    raw: H::Value,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl<'h, H: HostApi + ?Sized> HostValue<'h, H> {
    /// Adopt one reference to `raw`
    ///
    /// The caller gives up its reference; it is released when the returned
    /// handle is dropped.
    pub fn from_raw(host: &'h H, raw: H::Value) -> Self {
        Self {
            host,
            raw,
            _not_send: PhantomData,
        }
    }

    /// Create an undefined value
    pub fn undefined(host: &'h H) -> Self {
        Self::from_raw(host, host.undefined())
    }

    /// Create a null value
    pub fn null(host: &'h H) -> Self {
        Self::from_raw(host, host.null())
    }

    /// Create a boolean value
    pub fn boolean(host: &'h H, b: bool) -> Self {
        Self::from_raw(host, host.boolean(b))
    }

    /// Take the host's pending exception
    ///
    /// Yields `null` when nothing is pending.
    pub fn take_exception(host: &'h H) -> Self {
        Self::from_raw(host, host.take_exception())
    }

    /// Get the raw value handle
    pub fn raw(&self) -> H::Value {
        self.raw
    }

    /// Get the host
    pub fn host(&self) -> &'h H {
        self.host
    }

    /// Check if this is the exception sentinel
    pub fn is_exception(&self) -> bool {
        self.host.is_exception(self.raw)
    }

    /// Give the reference back to the caller without releasing it
    pub fn into_raw(self) -> H::Value {
        let this = ManuallyDrop::new(self);
        this.raw
    }
}

impl<H: HostApi + ?Sized> Clone for HostValue<'_, H> {
    fn clone(&self) -> Self {
        Self::from_raw(self.host, self.host.dup_value(self.raw))
    }
}

impl<H: HostApi + ?Sized> Drop for HostValue<'_, H> {
    fn drop(&mut self) {
        self.host.free_value(self.raw);
    }
}

impl<H: HostApi + ?Sized> fmt::Debug for HostValue<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostValue({:?})", self.raw)
    }
}
