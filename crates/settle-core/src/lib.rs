//! Already-settled promises over an embedded JavaScript host.
//!
//! Wraps a value as a fulfilled promise, or an error as a rejected one,
//! without ever yielding to the host's event loop. Every handle taken from
//! the host is owned by an RAII type, so each one is released exactly once
//! on every path, including failures.
//!
//! # Example
//!
//! ```
//! use settle_core::{HostValue, Settlement, SettledPromiseFactory};
//! use settle_host::{PromiseState, RefHost};
//!
//! let host = RefHost::new();
//! let factory = SettledPromiseFactory::new(&host);
//!
//! let promise = factory.make_fulfilled(HostValue::boolean(&host, true)).unwrap();
//! assert_eq!(promise.settlement(), Settlement::Fulfilled);
//! assert_eq!(
//!     host.promise_state(promise.raw()),
//!     Some(PromiseState::Fulfilled(true.into()))
//! );
//!
//! drop(promise);
//! assert_eq!(host.live_objects(), 0);
//! ```
//!
//! # Thread Safety
//!
//! Handles are `!Send` and `!Sync`. A host context belongs to one thread.
//!
//! ```compile_fail
//! use settle_core::HostValue;
//! use settle_host::RefHost;
//!
//! let host = RefHost::new();
//! let value = HostValue::undefined(&host);
//! std::thread::spawn(move || drop(value));
//! ```

mod capability;
mod config;
mod error;
mod factory;
mod promise;
mod value;

pub use capability::Capability;
pub use config::{ResolverFailurePolicy, SettleConfig};
pub use error::{SettleError, SettleResult};
pub use factory::{SettledPromiseFactory, rejected_promise, resolved_promise};
pub use promise::{SettledPromise, Settlement};
pub use value::HostValue;

// Re-export the host API for embedders that only depend on this crate
pub use settle_host;
