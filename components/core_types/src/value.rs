//! JavaScript value representation.
//!
//! This module provides the `Value` enum carried by promises as fulfillment
//! values and rejection reasons. Any value can be a rejection reason; thrown
//! errors are wrapped in [`Value::Error`].

use std::collections::BTreeMap;
use std::fmt;

use crate::JsError;

/// Represents any JavaScript value a promise can settle with.
///
/// Compound values (`Array`, `Object`) are stored by value, so cloning a
/// `Value` produces an independent copy.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(number.type_of(), "number");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JavaScript undefined value
    #[default]
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(std::string::String),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Plain object with string keys
    Object(BTreeMap<std::string::String, Value>),
    /// Error object
    Error(Box<JsError>),
}

impl Value {
    /// Returns whether this value is truthy in JavaScript semantics.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Smi(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    /// assert!(Value::Array(vec![]).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Error(_) => true,
        }
    }

    /// Returns the JavaScript `typeof` result for this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            // null is an object, a historical quirk
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Error(_) => "object",
        }
    }

    /// Builds an object from `(key, value)` pairs.
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// let record = Value::object([("status", Value::from("fulfilled"))]);
    /// assert_eq!(record.get("status"), Some(&Value::from("fulfilled")));
    /// ```
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<std::string::String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up a property of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns the elements of an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the error wrapped by an error value.
    pub fn as_error(&self) -> Option<&JsError> {
        match self {
            Value::Error(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Returns the string slice of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<std::string::String> for Value {
    fn from(s: std::string::String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<JsError> for Value {
    fn from(error: JsError) -> Self {
        Value::Error(Box::new(error))
    }
}

/// Implementation of Display following JavaScript's `String()` conversion.
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Null.to_string(), "null");
/// assert_eq!(Value::Double(2.0).to_string(), "2");
/// assert_eq!(Value::from(vec![Value::Smi(1), Value::Smi(2)]).to_string(), "1,2");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    // Array.prototype.join renders null/undefined as empty
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Error(error) => write!(f, "{}", error),
        }
    }
}
