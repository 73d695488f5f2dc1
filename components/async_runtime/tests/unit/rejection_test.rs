//! Unhandled rejection reporting

use std::cell::RefCell;
use std::rc::Rc;

use async_runtime::{
    EventLoop, Promise, RuntimeConfig, RuntimeError, Task, UnhandledRejection,
    UnhandledRejectionPolicy,
};
use core_types::Value;

fn with_hook(event_loop: &mut EventLoop) -> Rc<RefCell<Vec<UnhandledRejection>>> {
    let reported = Rc::new(RefCell::new(Vec::new()));
    let r = reported.clone();
    event_loop.set_unhandled_rejection_hook(move |rejection| {
        r.borrow_mut().push(rejection.clone());
    });
    reported
}

#[test]
fn rejection_without_handler_is_reported() {
    let mut event_loop = EventLoop::new();
    let reported = with_hook(&mut event_loop);
    let promise = Promise::rejected(&event_loop.scheduler(), "nobody listens");

    event_loop.run_until_done().unwrap();
    assert_eq!(
        *reported.borrow(),
        vec![UnhandledRejection {
            promise: promise.id(),
            reason: Value::from("nobody listens"),
        }]
    );
}

#[test]
fn handler_attached_before_checkpoint_suppresses_report() {
    let mut event_loop = EventLoop::new();
    let reported = with_hook(&mut event_loop);
    let promise = Promise::rejected(&event_loop.scheduler(), "handled");
    promise.catch(|_| Ok(Value::Undefined.into()));

    event_loop.run_until_done().unwrap();
    assert!(reported.borrow().is_empty());
    assert!(promise.is_handled());
}

#[test]
fn passthrough_then_reports_the_derived_promise() {
    let mut event_loop = EventLoop::new();
    let reported = with_hook(&mut event_loop);
    let source = Promise::rejected(&event_loop.scheduler(), "propagated");
    let derived = source.then(|v| Ok(v.into()));

    event_loop.run_until_done().unwrap();
    let reported = reported.borrow();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].promise, derived.id());
    assert_eq!(reported[0].reason, Value::from("propagated"));
}

#[test]
fn late_handler_still_runs_and_is_reported_once() {
    let mut event_loop = EventLoop::new();
    let reported = with_hook(&mut event_loop);
    let promise = Promise::rejected(&event_loop.scheduler(), "late");

    let observed = Rc::new(RefCell::new(None));
    let o = observed.clone();
    let p = promise.clone();
    event_loop.enqueue_task(Task::new(move || {
        p.catch(move |reason| {
            *o.borrow_mut() = Some(reason);
            Ok(Value::Undefined.into())
        });
        Ok(())
    }));

    event_loop.run_until_done().unwrap();
    assert_eq!(reported.borrow().len(), 1);
    assert_eq!(*observed.borrow(), Some(Value::from("late")));
}

#[test]
fn combinator_inputs_count_as_handled() {
    let mut event_loop = EventLoop::new();
    let reported = with_hook(&mut event_loop);
    let scheduler = event_loop.scheduler();
    let all = Promise::all(
        &scheduler,
        vec![
            Promise::rejected(&scheduler, "one"),
            Promise::rejected(&scheduler, "two"),
        ],
    );

    event_loop.run_until_done().unwrap();
    let reported = reported.borrow();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].promise, all.id());
    assert_eq!(reported[0].reason, Value::from("one"));
}

#[test]
fn strict_policy_fails_the_run() {
    let config = RuntimeConfig {
        unhandled_rejections: UnhandledRejectionPolicy::Strict,
        ..RuntimeConfig::default()
    };
    let mut event_loop = EventLoop::with_config(config);
    let promise = Promise::rejected(&event_loop.scheduler(), "fatal");

    match event_loop.run_until_done() {
        Err(RuntimeError::UnhandledRejection { promise: id, reason }) => {
            assert_eq!(id, promise.id());
            assert_eq!(reason, Value::from("fatal"));
        }
        other => panic!("expected strict failure, got {:?}", other),
    }
}

#[test]
fn ignore_policy_still_calls_the_hook() {
    let config = RuntimeConfig {
        unhandled_rejections: UnhandledRejectionPolicy::Ignore,
        ..RuntimeConfig::default()
    };
    let mut event_loop = EventLoop::with_config(config);
    let reported = with_hook(&mut event_loop);
    Promise::rejected(&event_loop.scheduler(), "quiet");

    event_loop.run_until_done().unwrap();
    assert_eq!(reported.borrow().len(), 1);
}

#[test]
fn reporting_continues_past_the_remembered_limit() {
    let config = RuntimeConfig {
        max_reported_rejections: 2,
        ..RuntimeConfig::default()
    };
    let mut event_loop = EventLoop::with_config(config);
    let reported = with_hook(&mut event_loop);
    let scheduler = event_loop.scheduler();

    for i in 0..20 {
        let s = scheduler.clone();
        event_loop.enqueue_task(Task::new(move || {
            Promise::rejected(&s, Value::Smi(i));
            Ok(())
        }));
    }

    event_loop.run_until_done().unwrap();
    let reasons: Vec<Value> = reported.borrow().iter().map(|r| r.reason.clone()).collect();
    assert_eq!(reasons, (0..20).map(Value::Smi).collect::<Vec<_>>());
}
