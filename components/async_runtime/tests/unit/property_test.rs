//! Property tests for ordering guarantees

use async_runtime::{EventLoop, Promise};
use core_types::Value;
use proptest::prelude::*;

use crate::support::{delayed, entries, log, record, smi_array, ManualScheduler};

proptest! {
    #[test]
    fn identity_handler_preserves_numbers(n in any::<i32>()) {
        let (manual, scheduler) = ManualScheduler::new();
        let derived = Promise::resolved(&scheduler, Value::Smi(n)).then(|v| Ok(v.into()));
        manual.drain();
        prop_assert_eq!(derived.value(), Some(Value::Smi(n)));
    }

    #[test]
    fn identity_handler_preserves_strings(s in ".*") {
        let (manual, scheduler) = ManualScheduler::new();
        let derived = Promise::resolved(&scheduler, Value::from(s.clone())).then(|v| Ok(v.into()));
        manual.drain();
        prop_assert_eq!(derived.value(), Some(Value::String(s)));
    }

    #[test]
    fn rejection_passes_through_missing_handlers(depth in 1usize..20) {
        let (manual, scheduler) = ManualScheduler::new();
        let mut chain = Promise::rejected(&scheduler, "bottom");
        for _ in 0..depth {
            chain = chain.then(|v| Ok(v.into()));
        }
        manual.drain();
        prop_assert_eq!(chain.reason(), Some(Value::from("bottom")));
    }

    #[test]
    fn handlers_run_in_registration_order(count in 1usize..32) {
        let (manual, scheduler) = ManualScheduler::new();
        let (promise, resolver) = Promise::with_resolvers(&scheduler);
        let log = log();
        for i in 0..count {
            let l = log.clone();
            promise.then(move |v| {
                record(&l, i.to_string());
                Ok(v.into())
            });
        }
        resolver.resolve(Value::Null);
        manual.drain();

        let expected: Vec<String> = (0..count).map(|i| i.to_string()).collect();
        prop_assert_eq!(entries(&log), expected);
    }

    #[test]
    fn all_keeps_input_order_for_any_delays(delays in prop::collection::vec(0u64..100, 0..12)) {
        let mut event_loop = EventLoop::new();
        let inputs: Vec<Promise> = delays
            .iter()
            .enumerate()
            .map(|(i, ms)| delayed(&event_loop, *ms, Ok(Value::Smi(i as i32))))
            .collect();
        let result = Promise::all(&event_loop.scheduler(), inputs);

        event_loop.run_until_done().unwrap();
        let expected: Vec<i32> = (0..delays.len() as i32).collect();
        prop_assert_eq!(result.value(), Some(smi_array(&expected)));
    }
}
