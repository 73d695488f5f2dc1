//! Event loop implementation.
//!
//! This module provides the event loop that drives promises. It owns the task,
//! microtask and timer queues and hands out an [`EventLoopHandle`], the
//! [`Scheduler`] promises enqueue their reactions on.
//!
//! Time is virtual: when no task is ready, the clock jumps straight to the next
//! timer deadline, so runs are deterministic and never sleep.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use core_types::Value;

use crate::config::{RuntimeConfig, UnhandledRejectionPolicy};
use crate::promise::PromiseId;
use crate::rejection::{RejectionTracker, UnhandledRejection};
use crate::scheduler::{Scheduler, SchedulerRef};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerQueue};
use crate::RuntimeError;

/// Callback invoked for every rejection still unhandled at a checkpoint.
pub type UnhandledRejectionHook = Box<dyn FnMut(&UnhandledRejection)>;

/// The queues shared between an [`EventLoop`] and the promises it drives.
///
/// Tasks and timers can be scheduled through the handle from inside running
/// tasks and reactions.
#[derive(Debug, Default)]
pub struct EventLoopHandle {
    microtasks: RefCell<MicrotaskQueue>,
    tasks: RefCell<TaskQueue>,
    timers: RefCell<TimerQueue>,
    rejections: RefCell<RejectionTracker>,
    now_ms: Cell<u64>,
}

impl EventLoopHandle {
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            rejections: RefCell::new(RejectionTracker::with_capacity(
                config.max_reported_rejections,
            )),
            ..Self::default()
        }
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.tasks.borrow_mut().enqueue(task);
    }

    /// Schedules `task` to run once `delay` of virtual time has passed.
    pub fn set_timeout(&self, delay: Duration, task: Task) {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let deadline = self.now_ms.get().saturating_add(delay_ms);
        self.timers.borrow_mut().insert(deadline, task);
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.get())
    }

    fn next_task(&self) -> Option<Task> {
        let ready = self.tasks.borrow_mut().dequeue();
        if ready.is_some() {
            return ready;
        }
        let mut timers = self.timers.borrow_mut();
        let deadline = timers.next_deadline()?;
        if deadline > self.now_ms.get() {
            tracing::trace!(from = self.now_ms.get(), to = deadline, "advancing virtual clock");
            self.now_ms.set(deadline);
        }
        timers.pop_due(self.now_ms.get())
    }
}

impl Scheduler for EventLoopHandle {
    fn enqueue_microtask(&self, microtask: MicroTask) {
        self.microtasks.borrow_mut().enqueue(microtask);
    }

    fn track_rejection(&self, promise: PromiseId, reason: &Value) {
        self.rejections.borrow_mut().track(promise, reason.clone());
    }

    fn rejection_handled(&self, promise: PromiseId) {
        if self.rejections.borrow_mut().handled(promise) {
            tracing::debug!(promise = %promise, "rejection handled after being reported");
        }
    }
}

/// The JavaScript event loop.
///
/// Each turn of the loop:
/// 1. Drains the microtask queue, including microtasks enqueued while draining
/// 2. Reports rejections that are still unhandled
/// 3. Runs one task, or the earliest due timer
/// 4. Repeats
///
/// No task or timer ever runs while a microtask is pending.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use async_runtime::{EventLoop, Promise, Task};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let l = log.clone();
/// event_loop.enqueue_task(Task::new(move || {
///     l.borrow_mut().push("task");
///     Ok(())
/// }));
/// let l = log.clone();
/// Promise::resolved(&scheduler, Value::Undefined).then(move |v| {
///     l.borrow_mut().push("reaction");
///     Ok(v.into())
/// });
///
/// event_loop.run_until_done().unwrap();
/// assert_eq!(*log.borrow(), vec!["reaction", "task"]);
/// ```
pub struct EventLoop {
    handle: Rc<EventLoopHandle>,
    config: RuntimeConfig,
    on_unhandled_rejection: Option<UnhandledRejectionHook>,
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues and the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a new EventLoop with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            handle: Rc::new(EventLoopHandle::new(&config)),
            config,
            on_unhandled_rejection: None,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The shared queue handle.
    pub fn handle(&self) -> Rc<EventLoopHandle> {
        self.handle.clone()
    }

    /// The handle as a scheduler, for creating promises.
    pub fn scheduler(&self) -> SchedulerRef {
        self.handle.clone()
    }

    /// Installs the callback invoked for each unhandled rejection.
    pub fn set_unhandled_rejection_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&UnhandledRejection) + 'static,
    {
        self.on_unhandled_rejection = Some(Box::new(hook));
    }

    /// Adds a task to the task queue.
    ///
    /// The task will be executed after all pending microtasks.
    pub fn enqueue_task(&mut self, task: Task) {
        self.handle.enqueue_task(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&mut self, microtask: MicroTask) {
        self.handle.enqueue_microtask(microtask);
    }

    /// Schedules a timer task after `delay` of virtual time.
    pub fn set_timeout(&mut self, delay: Duration, task: Task) {
        self.handle.set_timeout(delay, task);
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        self.handle.now()
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.handle.tasks.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.handle.microtasks.borrow().is_empty()
    }

    /// Returns the number of timers not yet fired.
    pub fn pending_timers(&self) -> usize {
        self.handle.timers.borrow().len()
    }

    /// Runs the event loop until all tasks, timers and microtasks are processed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if everything completed, or the first error raised by a job,
    /// the microtask limit, or the strict rejection policy.
    pub fn run_until_done(&mut self) -> Result<(), RuntimeError> {
        loop {
            self.run_all_microtasks()?;
            if !self.run_next_task()? {
                return Ok(());
            }
        }
    }

    /// Processes one complete cycle: a microtask checkpoint, then one task
    /// followed by another checkpoint if a task was available.
    ///
    /// Returns whether a task ran.
    pub fn process_one_cycle(&mut self) -> Result<bool, RuntimeError> {
        self.run_all_microtasks()?;
        let ran = self.run_next_task()?;
        if ran {
            self.run_all_microtasks()?;
        }
        Ok(ran)
    }

    /// Runs all microtasks in the queue until empty (a microtask checkpoint).
    ///
    /// New microtasks added during execution are also processed before this
    /// method returns. Unhandled rejections are reported afterwards.
    pub fn run_all_microtasks(&mut self) -> Result<(), RuntimeError> {
        let limit = self.config.max_microtasks_per_checkpoint;
        let mut ran = 0usize;
        loop {
            let next = {
                let mut microtasks = self.handle.microtasks.borrow_mut();
                if microtasks.is_empty() {
                    break;
                }
                // the job stays queued for the next checkpoint
                if ran == limit {
                    return Err(RuntimeError::MicrotaskLimitExceeded { limit });
                }
                microtasks.dequeue()
            };
            let Some(microtask) = next else {
                break;
            };
            ran += 1;
            microtask.run()?;
        }
        if ran > 0 {
            tracing::trace!(microtasks = ran, "microtask checkpoint complete");
        }
        self.report_unhandled_rejections()
    }

    fn run_next_task(&mut self) -> Result<bool, RuntimeError> {
        match self.handle.next_task() {
            Some(task) => {
                tracing::trace!(now_ms = self.handle.now_ms.get(), "running task");
                task.run()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn report_unhandled_rejections(&mut self) -> Result<(), RuntimeError> {
        let unhandled = self.handle.rejections.borrow_mut().take_unhandled();
        let policy = self.config.unhandled_rejections;
        let mut first = None;
        for rejection in unhandled {
            if policy != UnhandledRejectionPolicy::Ignore {
                tracing::warn!(
                    promise = %rejection.promise,
                    reason = %rejection.reason,
                    "unhandled promise rejection"
                );
            }
            if let Some(hook) = self.on_unhandled_rejection.as_mut() {
                hook(&rejection);
            }
            if first.is_none() {
                first = Some(rejection);
            }
        }
        match first {
            Some(rejection) if policy == UnhandledRejectionPolicy::Strict => {
                Err(RuntimeError::UnhandledRejection {
                    promise: rejection.promise,
                    reason: rejection.reason,
                })
            }
            _ => Ok(()),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .field("has_rejection_hook", &self.on_unhandled_rejection.is_some())
            .finish()
    }
}
