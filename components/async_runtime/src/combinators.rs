//! Promise combinators: `all`, `race`, `all_settled` and `any`.
//!
//! Every combinator accepts an ordered collection of promises or plain values.
//! Plain values are wrapped with [`Promise::resolved`] first, so they still
//! report through the microtask queue like any other input.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use core_types::{JsError, Value};

use crate::promise::{HandlerResult, Promise, Resolution, Resolver};
use crate::scheduler::SchedulerRef;

/// One entry of an `all_settled` result.
#[derive(Debug, Clone, PartialEq)]
pub enum SettledOutcome {
    /// The input fulfilled with this value.
    Fulfilled(Value),
    /// The input rejected with this reason.
    Rejected(Value),
}

impl SettledOutcome {
    /// Returns true for a fulfilled outcome.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledOutcome::Fulfilled(_))
    }

    /// Converts the outcome into its record form,
    /// `{status: "fulfilled", value}` or `{status: "rejected", reason}`.
    ///
    /// ```
    /// use async_runtime::SettledOutcome;
    /// use core_types::Value;
    ///
    /// let record = SettledOutcome::Rejected(Value::from("e")).into_value();
    /// assert_eq!(record.get("status"), Some(&Value::from("rejected")));
    /// assert_eq!(record.get("reason"), Some(&Value::from("e")));
    /// ```
    pub fn into_value(self) -> Value {
        match self {
            SettledOutcome::Fulfilled(value) => {
                Value::object([("status", Value::from("fulfilled")), ("value", value)])
            }
            SettledOutcome::Rejected(reason) => {
                Value::object([("status", Value::from("rejected")), ("reason", reason)])
            }
        }
    }
}

impl TryFrom<&Value> for SettledOutcome {
    type Error = JsError;

    fn try_from(record: &Value) -> Result<Self, Self::Error> {
        let field = |key: &str| record.get(key).cloned().unwrap_or_default();
        match record.get("status").and_then(Value::as_str) {
            Some("fulfilled") => Ok(SettledOutcome::Fulfilled(field("value"))),
            Some("rejected") => Ok(SettledOutcome::Rejected(field("reason"))),
            _ => Err(JsError::type_error(format!(
                "{} is not a settled outcome record",
                record
            ))),
        }
    }
}

fn normalize<I>(scheduler: &SchedulerRef, items: I) -> Vec<Promise>
where
    I: IntoIterator,
    I::Item: Into<Resolution>,
{
    items
        .into_iter()
        .map(|item| Promise::resolved(scheduler, item))
        .collect()
}

struct SettledCollector {
    outcomes: RefCell<Vec<Option<SettledOutcome>>>,
    remaining: Cell<usize>,
    resolver: Resolver,
}

impl SettledCollector {
    fn record(&self, index: usize, outcome: SettledOutcome) {
        self.outcomes.borrow_mut()[index] = Some(outcome);
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() == 0 {
            let records: Vec<Value> = self
                .outcomes
                .borrow_mut()
                .drain(..)
                .flatten()
                .map(SettledOutcome::into_value)
                .collect();
            self.resolver.resolve(Value::Array(records));
        }
    }
}

fn ignored() -> HandlerResult {
    Ok(Resolution::Value(Value::Undefined))
}

impl Promise {
    /// Fulfills with every input's value, in input order, once all of them
    /// fulfill. Rejects with the first rejection reason; the remaining inputs
    /// keep running but their outcomes are discarded.
    ///
    /// An empty input fulfills immediately with an empty array.
    pub fn all<I>(scheduler: &SchedulerRef, items: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Resolution>,
    {
        let (result, resolver) = Promise::with_resolvers(scheduler);
        let inputs = normalize(scheduler, items);
        if inputs.is_empty() {
            resolver.resolve(Value::Array(Vec::new()));
            return result;
        }

        let values = Rc::new(RefCell::new(vec![Value::Undefined; inputs.len()]));
        let remaining = Rc::new(Cell::new(inputs.len()));
        for (index, input) in inputs.into_iter().enumerate() {
            let values = values.clone();
            let remaining = remaining.clone();
            let on_fulfilled = resolver.clone();
            let on_rejected = resolver.clone();
            input.then_or_else(
                move |value| {
                    values.borrow_mut()[index] = value;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let collected = std::mem::take(&mut *values.borrow_mut());
                        on_fulfilled.resolve(Value::Array(collected));
                    }
                    ignored()
                },
                move |reason| {
                    on_rejected.reject(reason);
                    ignored()
                },
            );
        }
        result
    }

    /// Settles like whichever input settles first. The other inputs are
    /// neither awaited nor cancelled.
    ///
    /// An empty input never settles.
    pub fn race<I>(scheduler: &SchedulerRef, items: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Resolution>,
    {
        let (result, resolver) = Promise::with_resolvers(scheduler);
        for input in normalize(scheduler, items) {
            let on_fulfilled = resolver.clone();
            let on_rejected = resolver.clone();
            input.then_or_else(
                move |value| {
                    on_fulfilled.resolve(value);
                    ignored()
                },
                move |reason| {
                    on_rejected.reject(reason);
                    ignored()
                },
            );
        }
        result
    }

    /// Fulfills, once every input has settled, with one outcome record per
    /// input in input order. Never rejects.
    ///
    /// See [`SettledOutcome::into_value`] for the record shape.
    pub fn all_settled<I>(scheduler: &SchedulerRef, items: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Resolution>,
    {
        let (result, resolver) = Promise::with_resolvers(scheduler);
        let inputs = normalize(scheduler, items);
        if inputs.is_empty() {
            resolver.resolve(Value::Array(Vec::new()));
            return result;
        }

        let collector = Rc::new(SettledCollector {
            outcomes: RefCell::new(vec![None; inputs.len()]),
            remaining: Cell::new(inputs.len()),
            resolver,
        });
        for (index, input) in inputs.into_iter().enumerate() {
            let on_fulfilled = collector.clone();
            let on_rejected = collector.clone();
            input.then_or_else(
                move |value| {
                    on_fulfilled.record(index, SettledOutcome::Fulfilled(value));
                    ignored()
                },
                move |reason| {
                    on_rejected.record(index, SettledOutcome::Rejected(reason));
                    ignored()
                },
            );
        }
        result
    }

    /// Fulfills with the first input to fulfill. If every input rejects,
    /// rejects with an `AggregateError` carrying all reasons in input order.
    ///
    /// An empty input rejects immediately with an empty `AggregateError`.
    pub fn any<I>(scheduler: &SchedulerRef, items: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Resolution>,
    {
        let (result, resolver) = Promise::with_resolvers(scheduler);
        let inputs = normalize(scheduler, items);
        if inputs.is_empty() {
            resolver.reject(JsError::aggregate(Vec::new()));
            return result;
        }

        let errors = Rc::new(RefCell::new(vec![Value::Undefined; inputs.len()]));
        let remaining = Rc::new(Cell::new(inputs.len()));
        for (index, input) in inputs.into_iter().enumerate() {
            let errors = errors.clone();
            let remaining = remaining.clone();
            let on_fulfilled = resolver.clone();
            let on_rejected = resolver.clone();
            input.then_or_else(
                move |value| {
                    on_fulfilled.resolve(value);
                    ignored()
                },
                move |reason| {
                    errors.borrow_mut()[index] = reason;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let collected = std::mem::take(&mut *errors.borrow_mut());
                        on_rejected.reject(JsError::aggregate(collected));
                    }
                    ignored()
                },
            );
        }
        result
    }
}
