//! Reference host: a refcounted object heap behind [`HostApi`]

use scopeguard::ScopeGuard;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::api::{HostApi, ResolvingFunctions};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::value::{ObjectId, PromiseState, RawValue};

/// One-shot failures that a test can arm on a [`RefHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The next `new_promise_capability` fails
    CapabilityCreation,
    /// The next `call` of a resolving function throws
    ResolverCall,
}

/// Allocation counters of a [`RefHost`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Objects allocated since creation
    pub allocations: u64,
    /// Objects whose last reference was released
    pub releases: u64,
    /// Objects currently alive
    pub live: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveKind {
    Fulfill,
    Reject,
}

#[derive(Debug)]
enum ObjectKind {
    Plain,
    String(String),
    Error {
        name: String,
        message: String,
    },
    Promise(PromiseState),
    /// A resolving function; the pair shares `already_resolved`
    Resolving {
        promise: ObjectId,
        kind: ResolveKind,
        already_resolved: Rc<Cell<bool>>,
    },
}

impl ObjectKind {
    fn children(&self) -> Option<ObjectId> {
        match self {
            Self::Promise(state) => state.payload().and_then(RawValue::object_id),
            Self::Resolving { promise, .. } => Some(*promise),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    refs: usize,
    kind: ObjectKind,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    slot: Option<Slot>,
}

#[derive(Debug, Default)]
struct Heap {
    entries: Vec<Entry>,
    free: Vec<u32>,
    stats: HeapStats,
}

/// Index of the next slot pushed onto a heap holding `len` entries
fn slot_index(len: usize) -> Result<u32, HostError> {
    u32::try_from(len).map_err(|_| HostError::SlotsExhausted)
}

impl Heap {
    fn insert(&mut self, kind: ObjectKind) -> Result<ObjectId, HostError> {
        let slot = Some(Slot { refs: 1, kind });
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize].slot = slot;
                index
            }
            None => {
                let index = slot_index(self.entries.len())?;
                self.entries.push(Entry {
                    generation: 0,
                    slot,
                });
                index
            }
        };
        self.stats.allocations += 1;
        self.stats.live += 1;
        Ok(ObjectId {
            index,
            generation: self.entries[index as usize].generation,
        })
    }

    /// Empty the slot and retire its generation
    fn remove(&mut self, id: ObjectId) -> Option<Slot> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let slot = entry.slot.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.stats.releases += 1;
        self.stats.live -= 1;
        Some(slot)
    }

    fn get(&self, id: ObjectId) -> Option<&Slot> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_ref())
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut Slot> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_mut())
    }
}

/// An instrumented single-threaded JavaScript host
///
/// Objects are reference counted exactly the way the embedding API
/// describes: every handle returned to the caller owns one reference, and
/// the last [`free_value`](HostApi::free_value) destroys the object and
/// releases whatever it referenced.
///
/// Reference cycles are never collected. A promise fulfilled with its own
/// resolve function keeps both objects alive after every handle is freed,
/// where an engine would rely on its cycle collector.
///
/// # Panics
///
/// Duplicating or freeing a handle whose object was already destroyed
/// panics. Such a call is a refcounting bug in the embedder.
pub struct RefHost {
    config: HostConfig,
    heap: RefCell<Heap>,
    pending_exception: Cell<Option<RawValue>>,
    faults: RefCell<VecDeque<Fault>>,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl Default for RefHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RefHost {
    /// Create a host with default config
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    /// Create a host with custom config
    pub fn with_config(config: HostConfig) -> Self {
        Self {
            config,
            heap: RefCell::new(Heap::default()),
            pending_exception: Cell::new(None),
            faults: RefCell::new(VecDeque::new()),
            _not_send: PhantomData,
        }
    }

    /// Get config
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Arm a one-shot fault
    pub fn inject(&self, fault: Fault) {
        self.faults.borrow_mut().push_back(fault);
    }

    /// Number of armed faults not yet triggered
    pub fn pending_faults(&self) -> usize {
        self.faults.borrow().len()
    }

    /// Create an empty object
    pub fn new_object(&self) -> RawValue {
        self.alloc_or_throw(ObjectKind::Plain)
    }

    /// Create a string object
    pub fn new_string(&self, s: &str) -> RawValue {
        self.alloc_or_throw(ObjectKind::String(s.to_string()))
    }

    /// Create an error object such as `TypeError: bad input`
    pub fn new_error(&self, name: &str, message: &str) -> RawValue {
        self.alloc_or_throw(ObjectKind::Error {
            name: name.to_string(),
            message: message.to_string(),
        })
    }

    /// Contents of a string object
    pub fn string_value(&self, value: RawValue) -> Option<String> {
        self.with_object(value, |kind| match kind {
            ObjectKind::String(s) => Some(s.clone()),
            _ => None,
        })
        .flatten()
    }

    /// `(name, message)` of an error object
    pub fn error_parts(&self, value: RawValue) -> Option<(String, String)> {
        self.with_object(value, |kind| match kind {
            ObjectKind::Error { name, message } => Some((name.clone(), message.clone())),
            _ => None,
        })
        .flatten()
    }

    /// Settlement state of a promise object
    pub fn promise_state(&self, value: RawValue) -> Option<PromiseState> {
        self.with_object(value, |kind| match kind {
            ObjectKind::Promise(state) => Some(*state),
            _ => None,
        })
        .flatten()
    }

    /// Check if a value is a live promise object
    pub fn is_promise(&self, value: RawValue) -> bool {
        self.promise_state(value).is_some()
    }

    /// Check if a value is a live callable object
    pub fn is_function(&self, value: RawValue) -> bool {
        self.with_object(value, |kind| matches!(kind, ObjectKind::Resolving { .. }))
            .unwrap_or(false)
    }

    /// Reference count of a live object, `None` for constants and dead objects
    pub fn ref_count(&self, value: RawValue) -> Option<usize> {
        let id = value.object_id()?;
        self.heap.borrow().get(id).map(|slot| slot.refs)
    }

    /// Check if a value is a constant or a live object
    pub fn is_live(&self, value: RawValue) -> bool {
        match value {
            RawValue::Object(id) => self.heap.borrow().get(id).is_some(),
            RawValue::Exception => false,
            _ => true,
        }
    }

    /// Number of objects currently alive
    pub fn live_objects(&self) -> usize {
        self.heap.borrow().stats.live
    }

    /// Allocation counters
    pub fn stats(&self) -> HeapStats {
        self.heap.borrow().stats
    }

    /// Check if an exception is pending
    pub fn has_exception(&self) -> bool {
        self.pending_exception.get().is_some()
    }

    fn with_object<R>(&self, value: RawValue, f: impl FnOnce(&ObjectKind) -> R) -> Option<R> {
        let id = value.object_id()?;
        let heap = self.heap.borrow();
        heap.get(id).map(|slot| f(&slot.kind))
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let mut faults = self.faults.borrow_mut();
        match faults.iter().position(|f| *f == fault) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }

    fn alloc(&self, kind: ObjectKind) -> Result<ObjectId, HostError> {
        let mut heap = self.heap.borrow_mut();
        if let Some(limit) = self.config.max_objects {
            if heap.stats.live >= limit {
                return Err(HostError::ObjectLimit { limit });
            }
        }
        heap.insert(kind)
    }

    fn alloc_or_throw(&self, kind: ObjectKind) -> RawValue {
        match self.alloc(kind) {
            Ok(id) => RawValue::Object(id),
            Err(err) => self.throw(err),
        }
    }

    fn throw(&self, err: HostError) -> RawValue {
        debug!(error = %err, "host exception raised");
        self.raise(err.error_name(), &err.script_message())
    }

    /// Make a new error the pending exception and return the sentinel
    ///
    /// The exception object itself is exempt from the object limit, the same
    /// way engines keep an out-of-memory error preallocated. If not even the
    /// error object fits, `null` is thrown instead.
    fn raise(&self, name: &str, message: &str) -> RawValue {
        let inserted = self.heap.borrow_mut().insert(ObjectKind::Error {
            name: name.to_string(),
            message: message.to_string(),
        });
        let exception = match inserted {
            Ok(id) => RawValue::Object(id),
            Err(err) => {
                warn!(error = %err, "no slot left for the exception object");
                RawValue::Null
            }
        };
        if let Some(previous) = self.pending_exception.replace(Some(exception)) {
            self.free_value(previous);
        }
        RawValue::Exception
    }

    fn retain(&self, id: ObjectId) {
        let mut heap = self.heap.borrow_mut();
        match heap.get_mut(id) {
            Some(slot) => slot.refs += 1,
            None => panic!("dup of released object {id}"),
        }
    }

    /// Drop one reference and destroy everything that reaches zero
    fn release(&self, id: ObjectId) {
        let mut worklist = vec![id];
        let mut heap = self.heap.borrow_mut();
        while let Some(id) = worklist.pop() {
            let Some(slot) = heap.get_mut(id) else {
                panic!("free of released object {id}");
            };
            slot.refs -= 1;
            if slot.refs > 0 {
                continue;
            }
            if let Some(child) = heap.remove(id).and_then(|slot| slot.kind.children()) {
                worklist.push(child);
            }
        }
    }

    fn alloc_resolving(
        &self,
        promise: ObjectId,
        kind: ResolveKind,
        already_resolved: &Rc<Cell<bool>>,
    ) -> Result<ObjectId, HostError> {
        let id = self.alloc(ObjectKind::Resolving {
            promise,
            kind,
            already_resolved: Rc::clone(already_resolved),
        })?;
        self.retain(promise);
        Ok(id)
    }

    fn try_new_capability(&self) -> Result<(ObjectId, ObjectId, ObjectId), HostError> {
        if self.take_fault(Fault::CapabilityCreation) {
            return Err(HostError::Injected("promise capability creation"));
        }

        // Partial capabilities are rolled back on every early return.
        let promise = scopeguard::guard(
            self.alloc(ObjectKind::Promise(PromiseState::Pending))?,
            |id| self.release(id),
        );
        let already_resolved = Rc::new(Cell::new(false));
        let resolve = scopeguard::guard(
            self.alloc_resolving(*promise, ResolveKind::Fulfill, &already_resolved)?,
            |id| self.release(id),
        );
        let reject = self.alloc_resolving(*promise, ResolveKind::Reject, &already_resolved)?;

        Ok((
            ScopeGuard::into_inner(promise),
            ScopeGuard::into_inner(resolve),
            reject,
        ))
    }

    /// Move a pending promise to its terminal state
    fn settle(&self, promise: ObjectId, kind: ResolveKind, value: RawValue) -> RawValue {
        // A promise resolved with itself is rejected with a TypeError.
        let (kind, payload) = if kind == ResolveKind::Fulfill && value == RawValue::Object(promise) {
            match self.alloc(ObjectKind::Error {
                name: "TypeError".to_string(),
                message: "Chaining cycle detected for promise".to_string(),
            }) {
                Ok(err) => (ResolveKind::Reject, RawValue::Object(err)),
                Err(err) => return self.throw(err),
            }
        } else {
            (kind, self.dup_value(value))
        };

        let state = match kind {
            ResolveKind::Fulfill => PromiseState::Fulfilled(payload),
            ResolveKind::Reject => PromiseState::Rejected(payload),
        };
        trace!(promise = %promise, ?state, "promise settled");

        let mut heap = self.heap.borrow_mut();
        if let Some(Slot {
            kind: ObjectKind::Promise(current),
            ..
        }) = heap.get_mut(promise)
        {
            *current = state;
        }
        RawValue::Undefined
    }
}

impl HostApi for RefHost {
    type Value = RawValue;

    fn undefined(&self) -> RawValue {
        RawValue::Undefined
    }

    fn null(&self) -> RawValue {
        RawValue::Null
    }

    fn boolean(&self, b: bool) -> RawValue {
        RawValue::Bool(b)
    }

    fn exception(&self) -> RawValue {
        RawValue::Exception
    }

    fn is_exception(&self, value: RawValue) -> bool {
        value.is_exception()
    }

    fn new_promise_capability(&self) -> (RawValue, ResolvingFunctions<RawValue>) {
        match self.try_new_capability() {
            Ok((promise, resolve, reject)) => (
                RawValue::Object(promise),
                [RawValue::Object(resolve), RawValue::Object(reject)],
            ),
            Err(err) => (self.throw(err), [RawValue::Undefined, RawValue::Undefined]),
        }
    }

    fn call(&self, func: RawValue, _this: RawValue, args: &[RawValue]) -> RawValue {
        let target = self.with_object(func, |kind| match kind {
            ObjectKind::Resolving {
                promise,
                kind,
                already_resolved,
            } => Some((*promise, *kind, Rc::clone(already_resolved))),
            _ => None,
        });
        let Some(Some((promise, kind, already_resolved))) = target else {
            return self.raise("TypeError", "not a function");
        };

        if self.take_fault(Fault::ResolverCall) {
            return self.throw(HostError::Injected("resolving function call"));
        }
        if already_resolved.replace(true) {
            return RawValue::Undefined;
        }

        let value = args.first().copied().unwrap_or(RawValue::Undefined);
        self.settle(promise, kind, value)
    }

    fn dup_value(&self, value: RawValue) -> RawValue {
        if let RawValue::Object(id) = value {
            self.retain(id);
            if self.config.trace_refcounts {
                trace!(object = %id, refs = self.ref_count(value), "dup");
            }
        }
        value
    }

    fn free_value(&self, value: RawValue) {
        if let RawValue::Object(id) = value {
            self.release(id);
            if self.config.trace_refcounts {
                trace!(object = %id, refs = self.ref_count(value), "free");
            }
        }
    }

    fn take_exception(&self) -> RawValue {
        self.pending_exception.take().unwrap_or(RawValue::Null)
    }

    fn describe_exception(&self) -> Option<String> {
        let pending = self.pending_exception.get()?;
        let description = self
            .error_parts(pending)
            .map(|(name, message)| format!("{name}: {message}"))
            .or_else(|| self.string_value(pending))
            .unwrap_or_else(|| format!("{pending:?}"));
        Some(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_all(host: &RefHost, values: &[RawValue]) {
        for v in values {
            host.free_value(*v);
        }
    }

    #[test]
    fn test_host_creation() {
        let host = RefHost::new();
        assert_eq!(host.live_objects(), 0);
        assert_eq!(host.stats(), HeapStats::default());
        assert!(!host.has_exception());
    }

    #[test]
    fn test_capability_allocates_three_objects() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();

        assert!(host.is_promise(promise));
        assert!(host.is_function(resolve));
        assert!(host.is_function(reject));
        assert_eq!(host.live_objects(), 3);
        // Held by the caller and by both resolving functions
        assert_eq!(host.ref_count(promise), Some(3));

        free_all(&host, &[resolve, reject, promise]);
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_resolving_functions_keep_promise_alive() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();
        host.free_value(promise);
        assert_eq!(host.live_objects(), 3);

        host.free_value(resolve);
        host.free_value(reject);
        assert_eq!(host.live_objects(), 0);
        assert_eq!(host.stats().releases, 3);
    }

    #[test]
    fn test_resolve_fulfills_and_retains_payload() {
        let host = RefHost::new();
        let obj = host.new_object();
        let (promise, [resolve, reject]) = host.new_promise_capability();

        let ret = host.call(resolve, host.undefined(), &[obj]);
        assert_eq!(ret, RawValue::Undefined);
        assert_eq!(host.promise_state(promise), Some(PromiseState::Fulfilled(obj)));
        assert_eq!(host.ref_count(obj), Some(2));

        free_all(&host, &[resolve, reject, obj]);
        assert_eq!(host.ref_count(obj), Some(1));
        host.free_value(promise);
        assert!(!host.is_live(obj));
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_pair_settles_once() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();

        host.call(reject, host.undefined(), &[RawValue::Int(1)]);
        host.call(resolve, host.undefined(), &[RawValue::Int(2)]);
        host.call(reject, host.undefined(), &[RawValue::Int(3)]);

        assert_eq!(
            host.promise_state(promise),
            Some(PromiseState::Rejected(RawValue::Int(1)))
        );
        free_all(&host, &[promise, resolve, reject]);
    }

    #[test]
    fn test_resolve_without_arguments_fulfills_with_undefined() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();
        host.call(resolve, host.undefined(), &[]);
        assert_eq!(
            host.promise_state(promise),
            Some(PromiseState::Fulfilled(RawValue::Undefined))
        );
        free_all(&host, &[promise, resolve, reject]);
    }

    #[test]
    fn test_self_resolution_rejects_with_type_error() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();
        host.call(resolve, host.undefined(), &[promise]);

        let Some(PromiseState::Rejected(reason)) = host.promise_state(promise) else {
            panic!("expected rejection");
        };
        let (name, _) = host.error_parts(reason).unwrap();
        assert_eq!(name, "TypeError");

        free_all(&host, &[promise, resolve, reject]);
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_payload_cycles_are_not_collected() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();
        host.call(resolve, host.undefined(), &[resolve]);
        assert_eq!(
            host.promise_state(promise),
            Some(PromiseState::Fulfilled(resolve))
        );

        free_all(&host, &[promise, resolve, reject]);
        // promise -> resolve -> promise
        assert_eq!(host.live_objects(), 2);
        assert!(host.is_live(promise));
        assert!(host.is_live(resolve));
        assert!(!host.is_live(reject));
    }

    #[test]
    fn test_slot_index_overflow_is_out_of_memory() {
        assert_eq!(slot_index(0).unwrap(), 0);
        assert_eq!(slot_index(u32::MAX as usize).unwrap(), u32::MAX);

        if let Some(len) = (u32::MAX as usize).checked_add(1) {
            let err = slot_index(len).unwrap_err();
            assert!(matches!(err, HostError::SlotsExhausted));
            assert_eq!(err.error_name(), "InternalError");
            assert_eq!(err.script_message(), "out of memory");
        }
    }

    #[test]
    fn test_injected_capability_fault() {
        let host = RefHost::new();
        host.inject(Fault::CapabilityCreation);
        let (promise, [resolve, reject]) = host.new_promise_capability();

        assert!(host.is_exception(promise));
        assert_eq!(resolve, RawValue::Undefined);
        assert_eq!(reject, RawValue::Undefined);
        assert_eq!(host.pending_faults(), 0);
        assert_eq!(
            host.describe_exception().as_deref(),
            Some("InternalError: Injected fault: promise capability creation")
        );

        let exception = host.take_exception();
        assert!(!host.has_exception());
        host.free_value(exception);
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_object_limit_rolls_back_partial_capability() {
        for limit in 0..3 {
            let host = RefHost::with_config(HostConfig::new().max_objects(limit));
            let (promise, _) = host.new_promise_capability();
            assert!(host.is_exception(promise), "limit {limit}");
            assert_eq!(
                host.describe_exception().as_deref(),
                Some("InternalError: out of memory")
            );

            host.free_value(host.take_exception());
            assert_eq!(host.live_objects(), 0, "limit {limit}");
        }
    }

    #[test]
    fn test_injected_resolver_fault_leaves_promise_pending() {
        let host = RefHost::new();
        let (promise, [resolve, reject]) = host.new_promise_capability();
        host.inject(Fault::ResolverCall);

        let ret = host.call(resolve, host.undefined(), &[RawValue::Bool(true)]);
        assert!(host.is_exception(ret));
        assert_eq!(host.promise_state(promise), Some(PromiseState::Pending));

        host.free_value(host.take_exception());
        free_all(&host, &[promise, resolve, reject]);
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_call_non_function_throws() {
        let host = RefHost::new();
        let obj = host.new_object();
        assert!(host.is_exception(host.call(obj, host.undefined(), &[])));
        assert_eq!(host.describe_exception().as_deref(), Some("TypeError: not a function"));
        host.free_value(host.take_exception());
        host.free_value(obj);
    }

    #[test]
    fn test_newer_exception_replaces_pending() {
        let host = RefHost::new();
        host.call(RawValue::Undefined, RawValue::Undefined, &[]);
        host.call(RawValue::Null, RawValue::Undefined, &[]);
        assert_eq!(host.live_objects(), 1);
        host.free_value(host.take_exception());
        assert_eq!(host.take_exception(), RawValue::Null);
    }

    #[test]
    fn test_constants_are_not_counted() {
        let host = RefHost::new();
        for v in [host.undefined(), host.null(), host.boolean(true), RawValue::Int(5)] {
            assert_eq!(host.dup_value(v), v);
            host.free_value(v);
            assert_eq!(host.ref_count(v), None);
            assert!(host.is_live(v));
        }
        assert_eq!(host.stats(), HeapStats::default());
    }

    #[test]
    fn test_string_and_error_accessors() {
        let host = RefHost::new();
        let s = host.new_string("hello");
        let e = host.new_error("RangeError", "too far");
        assert_eq!(host.string_value(s).as_deref(), Some("hello"));
        assert_eq!(host.error_parts(s), None);
        assert_eq!(
            host.error_parts(e),
            Some(("RangeError".to_string(), "too far".to_string()))
        );
        free_all(&host, &[s, e]);
    }

    #[test]
    #[should_panic(expected = "free of released object")]
    fn test_double_free_panics() {
        let host = RefHost::new();
        let obj = host.new_object();
        host.free_value(obj);
        host.free_value(obj);
    }

    #[test]
    fn test_stats_serialize() {
        let host = RefHost::new();
        let obj = host.new_object();
        host.free_value(obj);
        let json = serde_json::to_value(host.stats()).unwrap();
        assert_eq!(json["allocations"], 1);
        assert_eq!(json["releases"], 1);
        assert_eq!(json["live"], 0);
    }
}
