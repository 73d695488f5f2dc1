//! Errors surfaced by the event loop and runtime configuration.
//!
//! Promise rejections are not errors at this level: they travel through the
//! promise graph as values. Only host failures end up here.

use core_types::{JsError, Value};
use thiserror::Error;

use crate::promise::PromiseId;

/// Errors that abort an event loop run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A task or host microtask returned an error.
    #[error("job failed: {0}")]
    Job(#[from] JsError),

    /// A single checkpoint ran more microtasks than allowed.
    #[error("microtask checkpoint exceeded {limit} jobs")]
    MicrotaskLimitExceeded {
        /// The configured limit
        limit: usize,
    },

    /// A rejection was left unhandled under the strict policy.
    #[error("unhandled promise rejection {promise}: {reason}")]
    UnhandledRejection {
        /// The rejected promise
        promise: PromiseId,
        /// Its rejection reason
        reason: Value,
    },

    /// The runtime configuration could not be parsed or serialized.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
