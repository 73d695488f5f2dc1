//! Task, microtask and timer queue management.
//!
//! This module provides the queues used by the event loop. Tasks are executed
//! one at a time, with all microtasks draining before and after each task.
//! Timers are tasks that become runnable once the virtual clock reaches their
//! deadline.

use core_types::JsError;
use std::collections::{BTreeMap, VecDeque};

/// A task to be executed by the event loop.
///
/// Tasks represent coarse-grained work such as timer callbacks or host
/// callbacks. They never run while microtasks are pending.
pub struct Task {
    callback: Box<dyn FnOnce() -> Result<(), JsError>>,
}

impl Task {
    /// Creates a new Task from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the task runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) -> Result<(), JsError> {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A microtask to be executed by the event loop.
///
/// Microtasks are drained completely before any task runs. Promise reactions
/// and promise resolution jobs are microtasks.
pub struct MicroTask {
    callback: Box<dyn FnOnce() -> Result<(), JsError>>,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the microtask runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask.
    pub fn run(self) -> Result<(), JsError> {
        (self.callback)()
    }
}

impl std::fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// First-in first-out queue of jobs awaiting the event loop.
#[derive(Debug)]
pub struct JobQueue<J> {
    jobs: VecDeque<J>,
}

impl<J> JobQueue<J> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
        }
    }

    /// Appends a job.
    pub fn enqueue(&mut self, job: J) {
        self.jobs.push_back(job);
    }

    /// Takes the oldest job.
    pub fn dequeue(&mut self) -> Option<J> {
        self.jobs.pop_front()
    }

    /// Returns true if no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of waiting jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

impl<J> Default for JobQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ready tasks; the loop runs one per turn.
pub type TaskQueue = JobQueue<Task>;

/// Pending microtasks; a checkpoint drains all of them, including the ones
/// enqueued while draining.
pub type MicrotaskQueue = JobQueue<MicroTask>;

/// Timers ordered by virtual deadline (milliseconds), then by insertion.
///
/// Two timers with the same deadline fire in the order they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: BTreeMap<(u64, u64), Task>,
    next_seq: u64,
}

impl TimerQueue {
    /// Creates a new empty TimerQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to become runnable at `deadline`.
    pub fn insert(&mut self, deadline: u64, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert((deadline, seq), task);
    }

    /// Returns the earliest deadline, if any timer is pending.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Task> {
        let key = *self.timers.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.timers.remove(&key)
    }

    /// Returns true if no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Returns the number of pending timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }
}
