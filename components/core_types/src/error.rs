//! JavaScript error types carried as rejection reasons.
//!
//! This module provides error types that correspond to the built-in error
//! constructors a promise runtime needs to produce on its own: type errors for
//! chaining cycles, aggregate errors for `Promise.any`, and internal errors for
//! host failures.

use std::fmt;

use thiserror::Error;

use crate::Value;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type error (e.g. a promise resolved with itself)
    TypeError,
    /// Several errors bundled together (produced by `Promise.any`)
    AggregateError,
    /// Internal engine or host error
    InternalError,
}

impl ErrorKind {
    /// The constructor name of this error kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript error with a message.
///
/// `errors` is only populated for [`ErrorKind::AggregateError`], where it holds
/// the bundled reasons in input order.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let error = JsError::type_error("undefined is not a function");
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Bundled reasons of an aggregate error
    pub errors: Vec<Value>,
}

impl JsError {
    /// Creates an error of the given kind with no bundled reasons.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates an `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Creates an `AggregateError` bundling `errors` in the given order.
    pub fn aggregate(errors: Vec<Value>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: "All promises were rejected".to_string(),
            errors,
        }
    }
}
