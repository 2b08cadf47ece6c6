//! Factory for promises that are settled before they are returned

use settle_host::HostApi;

use crate::capability::Capability;
use crate::config::SettleConfig;
use crate::error::SettleResult;
use crate::promise::{SettledPromise, Settlement};
use crate::value::HostValue;

/// Produces promises already fulfilled or rejected with a given value
///
/// Settlement is synchronous: the promise is created, its resolving
/// function is called and every intermediate handle is released before the
/// promise is returned. Control never goes back to the host's event loop.
pub struct SettledPromiseFactory<'h, H: HostApi + ?Sized> {
    host: &'h H,
    config: SettleConfig,
}

impl<'h, H: HostApi + ?Sized> SettledPromiseFactory<'h, H> {
    /// Create a factory with default config
    pub fn new(host: &'h H) -> Self {
        Self::with_config(host, SettleConfig::default())
    }

    /// Create a factory with custom config
    pub fn with_config(host: &'h H, config: SettleConfig) -> Self {
        Self { host, config }
    }

    /// Get the host
    pub fn host(&self) -> &'h H {
        self.host
    }

    /// Get config
    pub fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Wrap `value` in a promise that is already fulfilled with it
    ///
    /// `value` is consumed. If the host cannot create the promise, `value`
    /// is released and the host's exception is left pending.
    pub fn make_fulfilled(&self, value: HostValue<'h, H>) -> SettleResult<SettledPromise<'h, H>> {
        self.make(Settlement::Fulfilled, value)
    }

    /// Wrap `error` in a promise that is already rejected with it
    ///
    /// Same ownership and failure rules as
    /// [`make_fulfilled`](Self::make_fulfilled).
    pub fn make_rejected(&self, error: HostValue<'h, H>) -> SettleResult<SettledPromise<'h, H>> {
        self.make(Settlement::Rejected, error)
    }

    fn make(
        &self,
        settlement: Settlement,
        value: HostValue<'h, H>,
    ) -> SettleResult<SettledPromise<'h, H>> {
        debug_assert!(
            std::ptr::addr_eq(value.host(), self.host),
            "value belongs to a different host"
        );
        // `value` is dropped, and so released, on the early return.
        let capability = Capability::new(self.host)?;
        capability.settle(settlement, value, self.config.resolver_failure)
    }
}

/// Wrap `value` in an already-fulfilled promise using the default config
pub fn resolved_promise<'h, H: HostApi + ?Sized>(
    host: &'h H,
    value: HostValue<'h, H>,
) -> SettleResult<SettledPromise<'h, H>> {
    SettledPromiseFactory::new(host).make_fulfilled(value)
}

/// Wrap `error` in an already-rejected promise using the default config
pub fn rejected_promise<'h, H: HostApi + ?Sized>(
    host: &'h H,
    error: HostValue<'h, H>,
) -> SettleResult<SettledPromise<'h, H>> {
    SettledPromiseFactory::new(host).make_rejected(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverFailurePolicy;
    use settle_host::{Fault, PromiseState, RawValue, RefHost};

    #[test]
    fn test_make_fulfilled_with_constants() {
        let host = RefHost::new();
        let factory = SettledPromiseFactory::new(&host);

        for (value, raw) in [
            (HostValue::undefined(&host), RawValue::Undefined),
            (HostValue::boolean(&host, true), RawValue::Bool(true)),
            (HostValue::boolean(&host, false), RawValue::Bool(false)),
        ] {
            let promise = factory.make_fulfilled(value).unwrap();
            assert!(promise.is_fulfilled());
            assert_eq!(
                host.promise_state(promise.raw()),
                Some(PromiseState::Fulfilled(raw))
            );
            assert_eq!(host.live_objects(), 1);
        }
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_make_rejected_moves_error_into_promise() {
        let host = RefHost::new();
        let factory = SettledPromiseFactory::new(&host);
        let error = host.new_error("Error", "nope");

        let promise = factory
            .make_rejected(HostValue::from_raw(&host, error))
            .unwrap();
        assert!(promise.is_rejected());
        assert_eq!(
            host.promise_state(promise.raw()),
            Some(PromiseState::Rejected(error))
        );
        assert_eq!(host.ref_count(error), Some(1));

        drop(promise);
        assert!(!host.is_live(error));
    }

    #[test]
    fn test_failure_releases_input() {
        let host = RefHost::new();
        let factory = SettledPromiseFactory::new(&host);
        host.inject(Fault::CapabilityCreation);

        let obj = host.new_object();
        let err = factory
            .make_fulfilled(HostValue::from_raw(&host, obj))
            .unwrap_err();
        assert!(err.is_capability_failure());
        assert!(!host.is_live(obj));

        drop(HostValue::take_exception(&host));
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_free_functions() {
        let host = RefHost::new();
        let fulfilled = resolved_promise(&host, HostValue::null(&host)).unwrap();
        let rejected = rejected_promise(&host, HostValue::undefined(&host)).unwrap();
        assert_eq!(
            host.promise_state(fulfilled.raw()),
            Some(PromiseState::Fulfilled(RawValue::Null))
        );
        assert_eq!(
            host.promise_state(rejected.raw()),
            Some(PromiseState::Rejected(RawValue::Undefined))
        );
    }

    #[test]
    fn test_config_is_used() {
        let host = RefHost::new();
        let config = SettleConfig::new().resolver_failure(ResolverFailurePolicy::Discard);
        let factory = SettledPromiseFactory::with_config(&host, config.clone());
        assert_eq!(factory.config(), &config);

        host.inject(Fault::ResolverCall);
        let err = factory.make_rejected(HostValue::boolean(&host, false)).unwrap_err();
        assert_eq!(err.error_type(), "SettlementError");
        assert!(!err.has_pending_exception());
        assert!(!host.has_exception());
        assert_eq!(host.live_objects(), 0);
    }
}
