//! Host engine API for settled promise helpers.
//!
//! [`HostApi`] mirrors the small slice of an embedded JavaScript engine's
//! C API that promise settlement needs: constant constructors, a promise
//! capability constructor, a call primitive and reference counting.
//!
//! [`RefHost`] is an in-process implementation of that API with a
//! refcounted object heap. It is instrumented (refcounts, allocation
//! statistics, promise inspection) and supports fault injection, which makes
//! it suitable both as a default host and as a test double.
//!
//! # Example
//!
//! ```
//! use settle_host::{HostApi, PromiseState, RefHost};
//!
//! let host = RefHost::new();
//! let (promise, [resolve, reject]) = host.new_promise_capability();
//! let ret = host.call(resolve, host.undefined(), &[host.boolean(true)]);
//! host.free_value(ret);
//! host.free_value(resolve);
//! host.free_value(reject);
//!
//! assert_eq!(
//!     host.promise_state(promise),
//!     Some(PromiseState::Fulfilled(host.boolean(true)))
//! );
//! host.free_value(promise);
//! assert_eq!(host.live_objects(), 0);
//! ```
//!
//! # Thread Safety
//!
//! `RefHost` is `!Send` and `!Sync`: like the engines it stands in for, a
//! context is owned by a single thread.

mod api;
mod config;
mod error;
mod heap;
mod value;

pub use api::{HostApi, ResolvingFunctions};
pub use config::HostConfig;
pub use error::{HostError, HostResult};
pub use heap::{Fault, HeapStats, RefHost};
pub use value::{ObjectId, PromiseState, RawValue};
