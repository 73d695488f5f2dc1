//! The scheduling seam between promises and whatever drives them.
//!
//! Promises never run reactions inline. Every reaction and resolution job is
//! handed to a [`Scheduler`], which must run them in FIFO order. The
//! [`EventLoop`](crate::EventLoop) handle is the production scheduler; tests
//! can plug in their own queue and drain it by hand.

use std::rc::Rc;

use core_types::Value;

use crate::promise::PromiseId;
use crate::task_queue::MicroTask;

/// A FIFO microtask facility with optional rejection tracking.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::collections::VecDeque;
/// use std::rc::Rc;
///
/// use async_runtime::{MicroTask, Promise, Scheduler, SchedulerRef};
/// use core_types::Value;
///
/// #[derive(Default)]
/// struct Queue(RefCell<VecDeque<MicroTask>>);
///
/// impl Scheduler for Queue {
///     fn enqueue_microtask(&self, microtask: MicroTask) {
///         self.0.borrow_mut().push_back(microtask);
///     }
/// }
///
/// let queue = Rc::new(Queue::default());
/// let scheduler: SchedulerRef = queue.clone();
/// let promise = Promise::resolved(&scheduler, Value::Smi(1)).then(|v| Ok(v.into()));
/// assert!(promise.is_pending());
///
/// loop {
///     let next = queue.0.borrow_mut().pop_front();
///     match next {
///         Some(job) => job.run().unwrap(),
///         None => break,
///     }
/// }
/// assert_eq!(promise.value(), Some(Value::Smi(1)));
/// ```
pub trait Scheduler {
    /// Appends a job to the microtask queue.
    fn enqueue_microtask(&self, microtask: MicroTask);

    /// Called when a promise is rejected while no rejection handler is attached.
    fn track_rejection(&self, _promise: PromiseId, _reason: &Value) {}

    /// Called when a handler is attached to a previously unhandled rejected promise.
    fn rejection_handled(&self, _promise: PromiseId) {}
}

/// Shared handle to a scheduler, held by every promise it drives.
pub type SchedulerRef = Rc<dyn Scheduler>;
