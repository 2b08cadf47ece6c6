//! Promise capability: a pending promise plus its resolving functions

use settle_host::HostApi;
use std::fmt;
use tracing::{debug, trace, warn};

use crate::config::ResolverFailurePolicy;
use crate::error::{SettleError, SettleResult};
use crate::promise::{SettledPromise, Settlement};
use crate::value::HostValue;

/// A freshly created promise together with its resolver pair
///
/// All three handles are owned; whatever is not handed out is released on
/// drop.
pub struct Capability<'h, H: HostApi + ?Sized> {
    promise: HostValue<'h, H>,
    resolve: HostValue<'h, H>,
    reject: HostValue<'h, H>,
}

impl<'h, H: HostApi + ?Sized> Capability<'h, H> {
    /// Ask the host for a new promise capability
    ///
    /// On failure the host's exception is left pending and described in the
    /// returned error.
    pub fn new(host: &'h H) -> SettleResult<Self> {
        let (promise, [resolve, reject]) = host.new_promise_capability();
        if host.is_exception(promise) {
            let message = describe_pending(host);
            debug!(%message, "promise capability creation failed");
            return Err(SettleError::capability_creation(message));
        }

        Ok(Self {
            promise: HostValue::from_raw(host, promise),
            resolve: HostValue::from_raw(host, resolve),
            reject: HostValue::from_raw(host, reject),
        })
    }

    /// The pending promise
    pub fn promise(&self) -> &HostValue<'h, H> {
        &self.promise
    }

    /// Drive the promise to `settlement` with `value` as its payload
    ///
    /// Consumes `value` and both resolving functions. Only the promise
    /// survives, and only if the settlement went through. A throwing
    /// resolver drops the promise too; `policy` decides whether the host's
    /// exception is left pending or released.
    pub fn settle(
        self,
        settlement: Settlement,
        value: HostValue<'h, H>,
        policy: ResolverFailurePolicy,
    ) -> SettleResult<SettledPromise<'h, H>> {
        let Self {
            promise,
            resolve,
            reject,
        } = self;
        let host = promise.host();

        let func = match settlement {
            Settlement::Fulfilled => &resolve,
            Settlement::Rejected => &reject,
        };
        let ret = HostValue::from_raw(host, host.call(func.raw(), host.undefined(), &[value.raw()]));
        let threw = ret.is_exception();

        drop(resolve);
        drop(reject);
        drop(value);
        drop(ret);

        if threw {
            let message = describe_pending(host);
            let exception_pending = match policy {
                ResolverFailurePolicy::Propagate => {
                    warn!(%settlement, %message, "resolving function threw");
                    true
                }
                ResolverFailurePolicy::Discard => {
                    warn!(%settlement, %message, "resolving function threw, exception discarded");
                    drop(HostValue::take_exception(host));
                    false
                }
            };
            return Err(SettleError::settlement(settlement, message, exception_pending));
        }

        trace!(%settlement, promise = ?promise.raw(), "promise settled");
        Ok(SettledPromise::new(promise, settlement))
    }
}

impl<H: HostApi + ?Sized> fmt::Debug for Capability<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("promise", &self.promise)
            .field("resolve", &self.resolve)
            .field("reject", &self.reject)
            .finish()
    }
}

fn describe_pending<H: HostApi + ?Sized>(host: &H) -> String {
    host.describe_exception()
        .unwrap_or_else(|| "no exception pending".to_string())
}
