//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::RuntimeError;

/// What the event loop does with rejections nobody handled by the end of a
/// microtask checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledRejectionPolicy {
    /// Only the registered hook is invoked.
    Ignore,
    /// Log a warning and invoke the hook.
    #[default]
    Warn,
    /// Log, invoke the hook, then fail the checkpoint.
    Strict,
}

/// Event loop settings.
///
/// Missing fields take their default values, so `{}` is a valid configuration.
///
/// # Examples
///
/// ```
/// use async_runtime::{RuntimeConfig, UnhandledRejectionPolicy};
///
/// let config = RuntimeConfig::from_json(r#"{"unhandled_rejections": "strict"}"#).unwrap();
/// assert_eq!(config.unhandled_rejections, UnhandledRejectionPolicy::Strict);
/// assert_eq!(config.max_microtasks_per_checkpoint, 100_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on microtasks run by one checkpoint, guarding against
    /// reactions that keep re-enqueueing themselves.
    pub max_microtasks_per_checkpoint: usize,
    /// Handling of rejections left unhandled at a checkpoint
    pub unhandled_rejections: UnhandledRejectionPolicy,
    /// How many reported promises are remembered for late-handling
    /// detection. The oldest are forgotten first.
    pub max_reported_rejections: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_microtasks_per_checkpoint: 100_000,
            unhandled_rejections: UnhandledRejectionPolicy::default(),
            max_reported_rejections: 1_024,
        }
    }
}

impl RuntimeConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
