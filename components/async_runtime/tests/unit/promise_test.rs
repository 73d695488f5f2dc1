//! Unit tests for Promise

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_runtime::{EventLoop, Promise, PromiseState, Resolution};
use core_types::{ErrorKind, JsError, Value};

use crate::support::{entries, log, record, ManualScheduler};

mod construction {
    use super::*;

    #[test]
    fn new_promise_is_pending() {
        let (_, scheduler) = ManualScheduler::new();
        let (promise, _resolver) = Promise::with_resolvers(&scheduler);
        assert_eq!(promise.state(), PromiseState::Pending);
        assert_eq!(promise.value(), None);
        assert_eq!(promise.reason(), None);
        assert!(promise.outcome().is_none());
    }

    #[test]
    fn executor_runs_synchronously() {
        let (manual, scheduler) = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let promise = Promise::new(&scheduler, move |resolver| {
            r.set(true);
            resolver.resolve(Value::Smi(7));
            Ok(())
        });

        assert!(ran.get());
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.value(), Some(Value::Smi(7)));
        assert_eq!(manual.len(), 0);
    }

    #[test]
    fn executor_error_rejects() {
        let (_, scheduler) = ManualScheduler::new();
        let promise = Promise::new(&scheduler, |_| Err(Value::from("thrown")));
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.reason(), Some(Value::from("thrown")));
    }

    #[test]
    fn executor_error_after_resolve_is_ignored() {
        let (_, scheduler) = ManualScheduler::new();
        let promise = Promise::new(&scheduler, |resolver| {
            resolver.resolve(Value::Smi(1));
            Err(Value::from("too late"))
        });
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.value(), Some(Value::Smi(1)));
    }

    #[test]
    fn resolver_outlives_executor() {
        let (_, scheduler) = ManualScheduler::new();
        let saved = Rc::new(RefCell::new(None));
        let s = saved.clone();
        let promise = Promise::new(&scheduler, move |resolver| {
            *s.borrow_mut() = Some(resolver);
            Ok(())
        });
        assert!(promise.is_pending());

        let resolver = saved.borrow_mut().take().unwrap();
        assert!(resolver.promise().ptr_eq(&promise));
        resolver.reject(JsError::type_error("later"));
        assert_eq!(promise.state(), PromiseState::Rejected);
    }
}

mod settlement {
    use super::*;

    #[test]
    fn resolve_twice_keeps_first_value() {
        let (_, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        resolver.resolve(Value::Smi(42));
        resolver.resolve(Value::Smi(100));
        assert_eq!(promise.value(), Some(Value::Smi(42)));
    }

    #[test]
    fn reject_after_resolve_is_ignored() {
        let (_, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        resolver.resolve(Value::Smi(42));
        resolver.reject("nope");
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.reason(), None);
    }

    #[test]
    fn resolve_after_reject_is_ignored() {
        let (_, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        resolver.reject("first");
        resolver.resolve(Value::Smi(42));
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.reason(), Some(Value::from("first")));
        assert_eq!(promise.value(), None);
    }

    #[test]
    fn double_settlement_schedules_reactions_once() {
        let (manual, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        promise.then_or_else(
            move |v| {
                c.set(c.get() + 1);
                Ok(v.into())
            },
            |reason| Err(reason),
        );

        resolver.resolve(Value::Smi(1));
        resolver.reject("x");
        resolver.resolve(Value::Smi(2));
        assert_eq!(manual.len(), 1);

        manual.drain();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn resolving_with_pending_promise_waits_for_it() {
        let (manual, scheduler) = ManualScheduler::new();
        let (inner, inner_resolver) = Promise::with_resolvers(&scheduler);
        let (outer, outer_resolver) = Promise::with_resolvers(&scheduler);

        outer_resolver.resolve(inner.clone());
        manual.drain();
        assert!(outer.is_pending());

        // locked in: the outer resolver no longer has any effect
        outer_resolver.resolve(Value::Smi(0));
        manual.drain();
        assert!(outer.is_pending());

        inner_resolver.resolve(Value::from("done"));
        manual.drain();
        assert_eq!(outer.value(), Some(Value::from("done")));
    }

    #[test]
    fn resolving_with_rejected_promise_rejects() {
        let (manual, scheduler) = ManualScheduler::new();
        let inner = Promise::rejected(&scheduler, "inner failure");
        let (adopting, resolver) = Promise::with_resolvers(&scheduler);
        resolver.resolve(inner.clone());
        assert!(adopting.is_pending());
        manual.drain();

        assert_eq!(adopting.reason(), Some(Value::from("inner failure")));
        assert!(inner.is_handled());
    }

    #[test]
    fn resolving_with_itself_is_a_chaining_cycle() {
        let (_, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        resolver.resolve(promise.clone());

        let reason = promise.reason().unwrap();
        let error = reason.as_error().unwrap();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert!(error.message.contains("Chaining cycle"));
    }
}

mod reactions {
    use super::*;

    #[test]
    fn reaction_never_runs_synchronously_on_settled_promise() {
        let (manual, scheduler) = ManualScheduler::new();
        let promise = Promise::resolved(&scheduler, Value::Smi(1));
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let derived = promise.then(move |v| {
            r.set(true);
            Ok(v.into())
        });

        assert!(!ran.get());
        assert!(derived.is_pending());
        assert_eq!(manual.len(), 1);

        manual.drain();
        assert!(ran.get());
        assert_eq!(derived.value(), Some(Value::Smi(1)));
    }

    #[test]
    fn log_b_before_a() {
        let mut event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log = log();

        let d = Promise::new(&scheduler, |resolver| {
            resolver.resolve(Value::Smi(1));
            Ok(())
        });
        let l = log.clone();
        d.then(move |v| {
            record(&l, format!("a {}", v));
            Ok(v.into())
        });
        record(&log, "b");

        event_loop.run_until_done().unwrap();
        assert_eq!(entries(&log), vec!["b", "a 1"]);
    }

    #[test]
    fn reactions_run_in_registration_order() {
        let (manual, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        let log = log();
        for name in ["f1", "f2", "f3"] {
            let l = log.clone();
            promise.then(move |v| {
                record(&l, name);
                Ok(v.into())
            });
        }

        resolver.resolve(Value::Undefined);
        manual.drain();
        assert_eq!(entries(&log), vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn rejection_reactions_run_in_registration_order() {
        let (manual, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        let log = log();
        for name in ["r1", "r2"] {
            let l = log.clone();
            promise.catch(move |reason| {
                record(&l, format!("{} {}", name, reason));
                Ok(Value::Undefined.into())
            });
        }

        resolver.reject("boom");
        manual.drain();
        assert_eq!(entries(&log), vec!["r1 boom", "r2 boom"]);
    }

    #[test]
    fn cross_promise_order_follows_settlement_order() {
        let (manual, scheduler) = ManualScheduler::new();
        let (first, resolve_first) = Promise::with_resolvers(&scheduler);
        let (second, resolve_second) = Promise::with_resolvers(&scheduler);
        let log = log();

        let l = log.clone();
        first.then(move |v| {
            record(&l, "first");
            Ok(v.into())
        });
        let l = log.clone();
        second.then(move |v| {
            record(&l, "second");
            Ok(v.into())
        });

        resolve_second.resolve(Value::Undefined);
        resolve_first.resolve(Value::Undefined);
        manual.drain();
        assert_eq!(entries(&log), vec!["second", "first"]);
    }
}

mod chaining {
    use super::*;

    fn add_one(v: Value) -> Result<Resolution, Value> {
        match v {
            Value::Smi(n) => Ok(Value::Smi(n + 1).into()),
            other => Err(other),
        }
    }

    #[test]
    fn then_transforms_value() {
        let (manual, scheduler) = ManualScheduler::new();
        let result = Promise::resolved(&scheduler, Value::Smi(1))
            .then(add_one)
            .then(add_one);
        manual.drain();
        assert_eq!(result.value(), Some(Value::Smi(3)));
    }

    #[test]
    fn handler_error_rejects_derived() {
        let (manual, scheduler) = ManualScheduler::new();
        let derived = Promise::resolved(&scheduler, Value::Smi(1))
            .then(|_| Err(Value::from(JsError::type_error("bad handler"))));
        manual.drain();
        assert_eq!(
            derived.reason(),
            Some(Value::from(JsError::type_error("bad handler")))
        );
    }

    #[test]
    fn rejection_passes_through_then_without_handler() {
        let (manual, scheduler) = ManualScheduler::new();
        let called = Rc::new(Cell::new(false));
        let c = called.clone();
        let result = Promise::rejected(&scheduler, "original")
            .then(move |v| {
                c.set(true);
                Ok(v.into())
            })
            .then(add_one);
        manual.drain();

        assert!(!called.get());
        assert_eq!(result.reason(), Some(Value::from("original")));
    }

    #[test]
    fn catch_stops_propagation() {
        let (manual, scheduler) = ManualScheduler::new();
        let result = Promise::rejected(&scheduler, "oops")
            .then(add_one)
            .catch(|reason| Ok(Value::from(format!("recovered from {}", reason)).into()))
            .then(|v| Ok(v.into()));
        manual.drain();
        assert_eq!(result.value(), Some(Value::from("recovered from oops")));
    }

    #[test]
    fn catch_passes_fulfillment_through() {
        let (manual, scheduler) = ManualScheduler::new();
        let result = Promise::resolved(&scheduler, Value::Smi(5)).catch(|_| Ok(Value::Null.into()));
        manual.drain();
        assert_eq!(result.value(), Some(Value::Smi(5)));
    }

    #[test]
    fn then_with_no_handlers_is_identity() {
        let (manual, scheduler) = ManualScheduler::new();
        let fulfilled = Promise::resolved(&scheduler, Value::Smi(9)).then_with(None, None);
        let rejected = Promise::rejected(&scheduler, "r").then_with(None, None);
        manual.drain();
        assert_eq!(fulfilled.value(), Some(Value::Smi(9)));
        assert_eq!(rejected.reason(), Some(Value::from("r")));
    }

    #[test]
    fn handler_returning_pending_promise_waits() {
        let (manual, scheduler) = ManualScheduler::new();
        let (inner, inner_resolver) = Promise::with_resolvers(&scheduler);
        let returned = inner.clone();
        let derived = Promise::resolved(&scheduler, Value::Undefined).then(move |_| Ok(returned.into()));

        manual.drain();
        assert!(derived.is_pending());

        inner_resolver.resolve(Value::from("inner"));
        manual.drain();
        assert_eq!(derived.value(), Some(Value::from("inner")));
    }

    #[test]
    fn handler_returning_rejected_promise_rejects() {
        let (manual, scheduler) = ManualScheduler::new();
        let s = scheduler.clone();
        let derived = Promise::resolved(&scheduler, Value::Undefined)
            .then(move |_| Ok(Promise::rejected(&s, "nested").into()));
        manual.drain();
        assert_eq!(derived.reason(), Some(Value::from("nested")));
    }

    #[test]
    fn handler_returning_its_own_promise_is_a_chaining_cycle() {
        let mut event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let slot: Rc<RefCell<Option<Promise>>> = Rc::new(RefCell::new(None));

        let s = slot.clone();
        let derived = Promise::resolved(&scheduler, Value::Undefined).then(move |_| {
            let me = s.borrow().clone().ok_or(Value::Null)?;
            Ok(me.into())
        });
        *slot.borrow_mut() = Some(derived.clone());
        let observed = derived.catch(|reason| Ok(reason.into()));

        event_loop.run_until_done().unwrap();
        let reason = observed.value().unwrap();
        assert_eq!(reason.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
        assert_eq!(derived.state(), PromiseState::Rejected);
    }
}

mod finally {
    use super::*;

    #[test]
    fn finally_preserves_fulfillment() {
        let (manual, scheduler) = ManualScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let result = Promise::resolved(&scheduler, Value::Smi(1)).finally(move || {
            c.set(c.get() + 1);
            Ok(Value::from("ignored").into())
        });
        manual.drain();
        assert_eq!(calls.get(), 1);
        assert_eq!(result.value(), Some(Value::Smi(1)));
    }

    #[test]
    fn finally_preserves_rejection() {
        let (manual, scheduler) = ManualScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let result = Promise::rejected(&scheduler, "original").finally(move || {
            c.set(c.get() + 1);
            Ok(Value::Undefined.into())
        });
        manual.drain();
        assert_eq!(calls.get(), 1);
        assert_eq!(result.reason(), Some(Value::from("original")));
    }

    #[test]
    fn finally_error_overrides_fulfillment() {
        let (manual, scheduler) = ManualScheduler::new();
        let result = Promise::resolved(&scheduler, Value::Smi(1)).finally(|| Err(Value::from("cleanup failed")));
        manual.drain();
        assert_eq!(result.reason(), Some(Value::from("cleanup failed")));
    }

    #[test]
    fn finally_rejected_promise_overrides_rejection() {
        let (manual, scheduler) = ManualScheduler::new();
        let s = scheduler.clone();
        let result = Promise::rejected(&scheduler, "original")
            .finally(move || Ok(Promise::rejected(&s, "override").into()));
        manual.drain();
        assert_eq!(result.reason(), Some(Value::from("override")));
    }

    #[test]
    fn finally_waits_for_returned_promise() {
        let (manual, scheduler) = ManualScheduler::new();
        let (gate, open) = Promise::with_resolvers(&scheduler);
        let g = gate.clone();
        let result = Promise::resolved(&scheduler, Value::Smi(3)).finally(move || Ok(g.into()));

        manual.drain();
        assert!(result.is_pending());

        open.resolve(Value::from("gate value is not observed"));
        manual.drain();
        assert_eq!(result.value(), Some(Value::Smi(3)));
    }
}
