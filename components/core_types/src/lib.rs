//! Core JavaScript value types and error handling.
//!
//! This crate provides the foundational types shared by the async runtime:
//! the value representation promises settle with, and the error taxonomy used
//! for runtime-generated rejection reasons.
//!
//! # Overview
//!
//! - [`Value`] - Representation of JavaScript values
//! - [`JsError`] - JavaScript errors, including aggregate errors
//! - [`ErrorKind`] - Types of JavaScript errors
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::aggregate(vec![Value::from("a")]);
//! assert_eq!(error.kind, ErrorKind::AggregateError);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{ErrorKind, JsError};
pub use value::Value;
