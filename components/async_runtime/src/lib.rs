//! Async runtime for JavaScript-style promises.
//!
//! This crate provides the async runtime components:
//! - Promise implementation following the Promise/A+ specification
//! - Promise combinators (`all`, `race`, `all_settled`, `any`)
//! - Event loop with task, timer and microtask queues
//! - Tracking of rejections nobody handled
//!
//! # Overview
//!
//! - [`Promise`] - a value that becomes available later, settled exactly once
//! - [`Resolver`] - the resolve/reject capability pair of a promise
//! - [`Scheduler`] - the microtask seam promises run their reactions through
//! - [`EventLoop`] - the production scheduler, with a virtual clock
//!
//! Reactions never run inline. The executor passed to [`Promise::new`] runs
//! synchronously, but every handler attached with `then`, `catch` or `finally`
//! runs later, on the microtask queue.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use async_runtime::{EventLoop, Promise};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let d = Promise::new(&scheduler, |resolver| {
//!     resolver.resolve(Value::Smi(1));
//!     Ok(())
//! });
//! let l = log.clone();
//! d.then(move |v| {
//!     l.borrow_mut().push(format!("a {}", v));
//!     Ok(v.into())
//! });
//! log.borrow_mut().push("b".to_string());
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(*log.borrow(), vec!["b".to_string(), "a 1".to_string()]);
//! ```
//!
//! ## Combinators
//!
//! ```
//! use async_runtime::{EventLoop, Promise};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let all = Promise::all(
//!     &scheduler,
//!     vec![
//!         Promise::resolved(&scheduler, Value::Smi(1)),
//!         Promise::resolved(&scheduler, Value::Smi(2)),
//!     ],
//! );
//! event_loop.run_until_done().unwrap();
//! assert_eq!(all.value(), Some(Value::from(vec![Value::Smi(1), Value::Smi(2)])));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod rejection;
pub mod scheduler;
pub mod task_queue;

// Re-export main types at crate root
pub use combinators::SettledOutcome;
pub use config::{RuntimeConfig, UnhandledRejectionPolicy};
pub use error::RuntimeError;
pub use event_loop::{EventLoop, EventLoopHandle, UnhandledRejectionHook};
pub use promise::{
    Handler, HandlerResult, Promise, PromiseId, PromiseState, Resolution, Resolver, Thenable,
};
pub use rejection::{RejectionTracker, UnhandledRejection};
pub use scheduler::{Scheduler, SchedulerRef};
pub use task_queue::{JobQueue, MicroTask, MicrotaskQueue, Task, TaskQueue, TimerQueue};
