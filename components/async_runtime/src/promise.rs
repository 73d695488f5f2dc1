//! Promise implementation following the Promise/A+ specification.
//!
//! A [`Promise`] starts out pending and settles exactly once, either fulfilled
//! with a value or rejected with a reason. Reactions attached through
//! [`Promise::then`] and friends never run inline: they are always handed to
//! the promise's [`Scheduler`](crate::Scheduler) as microtasks, even when the
//! promise is already settled.
//!
//! Settlement goes through a [`Resolver`], the resolve/reject capability pair
//! given to executors. Resolving with another promise or a [`Thenable`] makes
//! the promise adopt that value's eventual state instead of settling at once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use core_types::{JsError, Value};

use crate::combinators::SettledOutcome;
use crate::scheduler::SchedulerRef;
use crate::task_queue::MicroTask;

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been fulfilled with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

impl PromiseState {
    /// Returns true for `Fulfilled` and `Rejected`.
    pub fn is_settled(self) -> bool {
        !matches!(self, PromiseState::Pending)
    }
}

/// Process-unique identifier of a promise, used in logs and rejection tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        PromiseId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a reaction handler produces: `Ok` feeds the derived promise's
/// resolution procedure, `Err` rejects it (the equivalent of a `throw`).
pub type HandlerResult = Result<Resolution, Value>;

/// A boxed fulfillment or rejection handler.
pub type Handler = Box<dyn FnOnce(Value) -> HandlerResult>;

/// A foreign value exposing a `then`-shaped capability.
///
/// During resolution a thenable is asked, on a microtask, to report its outcome
/// to a fresh [`Resolver`]. Only the first call on that resolver counts; an
/// `Err` returned after the resolver was used is ignored.
pub trait Thenable {
    /// Subscribes `resolver` to the eventual outcome of this value.
    fn then(&self, resolver: Resolver) -> Result<(), Value>;
}

/// Input of the promise resolution procedure.
///
/// Promises are never fulfilled with a promise: resolving with
/// [`Resolution::Promise`] or [`Resolution::Thenable`] adopts the inner state.
pub enum Resolution {
    /// A plain value; fulfills immediately.
    Value(Value),
    /// One of our own promises; adopted.
    Promise(Promise),
    /// A foreign thenable; adopted through its `then`.
    Thenable(Rc<dyn Thenable>),
}

impl Resolution {
    /// Wraps a thenable.
    pub fn thenable<T: Thenable + 'static>(thenable: T) -> Self {
        Resolution::Thenable(Rc::new(thenable))
    }
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<Promise> for Resolution {
    fn from(promise: Promise) -> Self {
        Resolution::Promise(promise)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => write!(f, "Thenable(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ReactionKind {
    Fulfill,
    Reject,
}

/// A reaction to be triggered when a Promise settles.
///
/// A missing handler passes the outcome through to `capability` unchanged.
struct PromiseReaction {
    kind: ReactionKind,
    handler: Option<Handler>,
    capability: Resolver,
}

impl PromiseReaction {
    fn run(self, argument: Value) {
        let outcome = match self.handler {
            Some(handler) => handler(argument),
            None => match self.kind {
                ReactionKind::Fulfill => Ok(Resolution::Value(argument)),
                ReactionKind::Reject => Err(argument),
            },
        };
        match outcome {
            Ok(resolution) => self.capability.resolve(resolution),
            Err(reason) => self.capability.reject(reason),
        }
    }
}

struct PromiseInner {
    id: PromiseId,
    state: PromiseState,
    value: Option<Value>,
    reason: Option<Value>,
    fulfill_reactions: Vec<PromiseReaction>,
    reject_reactions: Vec<PromiseReaction>,
    handled: bool,
}

/// A JavaScript Promise.
///
/// `Promise` is a shared handle: clones refer to the same promise, and
/// [`Promise::ptr_eq`] compares identity.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, PromiseState};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let promise = Promise::new(&scheduler, |resolver| {
///     resolver.resolve(Value::Smi(41));
///     Ok(())
/// });
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
///
/// let doubled = promise.then(|v| match v {
///     Value::Smi(n) => Ok(Value::Smi(n + 1).into()),
///     other => Err(other),
/// });
/// assert!(doubled.is_pending());
///
/// event_loop.run_until_done().unwrap();
/// assert_eq!(doubled.value(), Some(Value::Smi(42)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
    scheduler: SchedulerRef,
}

impl Promise {
    fn pending(scheduler: &SchedulerRef) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: PromiseId::next(),
                state: PromiseState::Pending,
                value: None,
                reason: None,
                fulfill_reactions: Vec::new(),
                reject_reactions: Vec::new(),
                handled: false,
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Creates a promise and runs `executor` synchronously with its resolver.
    ///
    /// An `Err` returned by the executor rejects the promise, unless the
    /// executor already resolved or rejected it.
    pub fn new<F>(scheduler: &SchedulerRef, executor: F) -> Self
    where
        F: FnOnce(Resolver) -> Result<(), Value>,
    {
        let (promise, resolver) = Self::with_resolvers(scheduler);
        if let Err(reason) = executor(resolver.clone()) {
            resolver.reject(reason);
        }
        promise
    }

    /// Creates a pending promise together with its resolver.
    pub fn with_resolvers(scheduler: &SchedulerRef) -> (Self, Resolver) {
        let promise = Self::pending(scheduler);
        let resolver = Resolver::new(promise.clone());
        (promise, resolver)
    }

    /// Returns a promise resolved with `resolution`.
    ///
    /// A [`Resolution::Promise`] is returned as is.
    pub fn resolved(scheduler: &SchedulerRef, resolution: impl Into<Resolution>) -> Self {
        match resolution.into() {
            Resolution::Promise(promise) => promise,
            other => {
                let (promise, resolver) = Self::with_resolvers(scheduler);
                resolver.resolve(other);
                promise
            }
        }
    }

    /// Returns a promise rejected with `reason`.
    pub fn rejected(scheduler: &SchedulerRef, reason: impl Into<Value>) -> Self {
        let (promise, resolver) = Self::with_resolvers(scheduler);
        resolver.reject(reason);
        promise
    }

    /// The promise's identifier.
    pub fn id(&self) -> PromiseId {
        self.inner.borrow().id
    }

    /// The current state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// The fulfillment value, once fulfilled.
    pub fn value(&self) -> Option<Value> {
        self.inner.borrow().value.clone()
    }

    /// The rejection reason, once rejected.
    pub fn reason(&self) -> Option<Value> {
        self.inner.borrow().reason.clone()
    }

    /// The settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<SettledOutcome> {
        let inner = self.inner.borrow();
        match inner.state {
            PromiseState::Pending => None,
            PromiseState::Fulfilled => Some(SettledOutcome::Fulfilled(
                inner.value.clone().unwrap_or_default(),
            )),
            PromiseState::Rejected => Some(SettledOutcome::Rejected(
                inner.reason.clone().unwrap_or_default(),
            )),
        }
    }

    /// Returns true once any reaction has been attached.
    pub fn is_handled(&self) -> bool {
        self.inner.borrow().handled
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The scheduler this promise enqueues its reactions on.
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }

    /// Attaches a fulfillment handler; rejections pass through unchanged.
    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> HandlerResult + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), None)
    }

    /// Attaches both a fulfillment and a rejection handler.
    pub fn then_or_else<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise
    where
        F: FnOnce(Value) -> HandlerResult + 'static,
        R: FnOnce(Value) -> HandlerResult + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    /// Attaches a rejection handler; fulfillments pass through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise
    where
        R: FnOnce(Value) -> HandlerResult + 'static,
    {
        self.then_with(None, Some(Box::new(on_rejected)))
    }

    /// Adds handlers for fulfillment and/or rejection.
    ///
    /// Returns a new pending promise resolved with whatever the invoked handler
    /// produces. A missing handler forwards the outcome unchanged. The handler
    /// runs on a microtask even if this promise has already settled.
    pub fn then_with(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let (derived, capability) = Self::with_resolvers(&self.scheduler);
        self.perform_then(on_fulfilled, on_rejected, capability);
        derived
    }

    /// Runs `on_settled` on either outcome and then forwards the original
    /// outcome.
    ///
    /// The callback cannot observe or change the value. If it fails, either by
    /// returning `Err` or a promise that rejects, that failure replaces the
    /// original outcome.
    pub fn finally<F>(&self, on_settled: F) -> Promise
    where
        F: FnOnce() -> HandlerResult + 'static,
    {
        // only one of the two branches ever runs
        let callback = Rc::new(RefCell::new(Some(on_settled)));

        let on_fulfilled = {
            let callback = callback.clone();
            let scheduler = self.scheduler.clone();
            move |value: Value| -> HandlerResult {
                let settled = take_and_call(&callback)?;
                let forwarded =
                    Promise::resolved(&scheduler, settled).then(move |_| Ok(value.into()));
                Ok(forwarded.into())
            }
        };
        let scheduler = self.scheduler.clone();
        let on_rejected = move |reason: Value| -> HandlerResult {
            let settled = take_and_call(&callback)?;
            let forwarded = Promise::resolved(&scheduler, settled).then(move |_| Err(reason));
            Ok(forwarded.into())
        };

        self.then_or_else(on_fulfilled, on_rejected)
    }

    fn perform_then(
        &self,
        on_fulfilled: Option<Handler>,
        on_rejected: Option<Handler>,
        capability: Resolver,
    ) {
        let fulfill = PromiseReaction {
            kind: ReactionKind::Fulfill,
            handler: on_fulfilled,
            capability: capability.clone(),
        };
        let reject = PromiseReaction {
            kind: ReactionKind::Reject,
            handler: on_rejected,
            capability,
        };

        let mut inner = self.inner.borrow_mut();
        let was_handled = std::mem::replace(&mut inner.handled, true);
        let state = inner.state;
        match state {
            PromiseState::Pending => {
                inner.fulfill_reactions.push(fulfill);
                inner.reject_reactions.push(reject);
            }
            PromiseState::Fulfilled => {
                let value = inner.value.clone().unwrap_or_default();
                drop(inner);
                self.enqueue_reaction(fulfill, value);
            }
            PromiseState::Rejected => {
                let reason = inner.reason.clone().unwrap_or_default();
                let id = inner.id;
                drop(inner);
                if !was_handled {
                    self.scheduler.rejection_handled(id);
                }
                self.enqueue_reaction(reject, reason);
            }
        }
    }

    fn resolve_with(&self, resolution: Resolution) {
        match resolution {
            Resolution::Value(value) => self.fulfill(value),
            Resolution::Promise(other) if other.ptr_eq(self) => {
                let error = JsError::type_error(format!(
                    "Chaining cycle detected for promise {}",
                    self.id()
                ));
                self.reject_with(error.into());
            }
            Resolution::Promise(other) => {
                let target = self.clone();
                self.scheduler.enqueue_microtask(MicroTask::new(move || {
                    other.perform_then(None, None, Resolver::new(target));
                    Ok(())
                }));
            }
            Resolution::Thenable(thenable) => {
                let target = self.clone();
                self.scheduler.enqueue_microtask(MicroTask::new(move || {
                    let resolver = Resolver::new(target);
                    if let Err(reason) = thenable.then(resolver.clone()) {
                        resolver.reject(reason);
                    }
                    Ok(())
                }));
            }
        }
    }

    fn fulfill(&self, value: Value) {
        let (id, reactions) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                return;
            }
            inner.state = PromiseState::Fulfilled;
            inner.value = Some(value.clone());
            inner.reject_reactions.clear();
            (inner.id, std::mem::take(&mut inner.fulfill_reactions))
        };
        tracing::trace!(promise = %id, reactions = reactions.len(), "promise fulfilled");
        for reaction in reactions {
            self.enqueue_reaction(reaction, value.clone());
        }
    }

    fn reject_with(&self, reason: Value) {
        let (id, handled, reactions) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                return;
            }
            inner.state = PromiseState::Rejected;
            inner.reason = Some(reason.clone());
            inner.fulfill_reactions.clear();
            (
                inner.id,
                inner.handled,
                std::mem::take(&mut inner.reject_reactions),
            )
        };
        tracing::trace!(promise = %id, reactions = reactions.len(), "promise rejected");
        if !handled {
            self.scheduler.track_rejection(id, &reason);
        }
        for reaction in reactions {
            self.enqueue_reaction(reaction, reason.clone());
        }
    }

    fn enqueue_reaction(&self, reaction: PromiseReaction, argument: Value) {
        self.scheduler.enqueue_microtask(MicroTask::new(move || {
            reaction.run(argument);
            Ok(())
        }));
    }
}

fn take_and_call<F>(callback: &RefCell<Option<F>>) -> HandlerResult
where
    F: FnOnce() -> HandlerResult,
{
    let taken = callback.borrow_mut().take();
    match taken {
        Some(on_settled) => on_settled(),
        None => Ok(Resolution::Value(Value::Undefined)),
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Promise")
            .field("id", &inner.id)
            .field("state", &inner.state)
            .field("value", &inner.value)
            .field("reason", &inner.reason)
            .finish()
    }
}

/// The resolve/reject capability pair of a promise.
///
/// All clones share one flag: after the first `resolve` or `reject` through any
/// of them, further calls are ignored. This also covers the window where the
/// promise is locked in to another promise but has not settled yet.
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
    already_resolved: Rc<Cell<bool>>,
}

impl Resolver {
    fn new(promise: Promise) -> Self {
        Self {
            promise,
            already_resolved: Rc::new(Cell::new(false)),
        }
    }

    /// The promise this resolver settles.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Returns true once `resolve` or `reject` has been called.
    pub fn is_resolved(&self) -> bool {
        self.already_resolved.get()
    }

    /// Resolves the promise.
    ///
    /// Plain values fulfill it. Promises and thenables are adopted on a
    /// microtask. Resolving a promise with itself rejects it with a
    /// `TypeError`.
    pub fn resolve(&self, resolution: impl Into<Resolution>) {
        if self.already_resolved.replace(true) {
            return;
        }
        self.promise.resolve_with(resolution.into());
    }

    /// Rejects the promise with `reason`.
    pub fn reject(&self, reason: impl Into<Value>) {
        if self.already_resolved.replace(true) {
            return;
        }
        self.promise.reject_with(reason.into());
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise.id())
            .field("already_resolved", &self.already_resolved.get())
            .finish()
    }
}
