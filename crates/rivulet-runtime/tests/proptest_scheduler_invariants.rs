//! Property tests for queue configuration and timer ordering.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use rivulet_runtime::config::{MIN_STACK_SIZE, STACK_SIZE_ENV, TIMER_LEEWAY_ENV};
use rivulet_runtime::{MainScheduler, QueueConfig, Scheduler};
use web_time::{Duration, Instant};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stack_size_override_is_validated(bytes in 0usize..(4 * MIN_STACK_SIZE)) {
        let raw = bytes.to_string();
        let result = QueueConfig::default()
            .apply_lookup(|key| (key == STACK_SIZE_ENV).then(|| raw.clone()));
        if bytes < MIN_STACK_SIZE {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result.unwrap().stack_size, Some(bytes));
        }
    }

    #[test]
    fn leeway_override_round_trips(ms in 0u64..10_000) {
        let raw = format!("  {ms} ");
        let config = QueueConfig::default()
            .apply_lookup(|key| (key == TIMER_LEEWAY_ENV).then(|| raw.clone()))
            .unwrap();
        prop_assert_eq!(config.timer_leeway, Duration::from_millis(ms));
    }

    #[test]
    fn garbage_overrides_never_panic(raw in "\\PC*") {
        let _ = QueueConfig::default().apply_lookup(|_| Some(raw.clone()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Delayed work fires in due-time order, ties broken by submission order.
    #[test]
    fn delayed_work_fires_in_due_order(delays in prop::collection::vec(0u64..20, 1..12)) {
        let (main, mut main_loop) = MainScheduler::new();
        let start = Instant::now() + Duration::from_millis(50);
        let log = Arc::new(Mutex::new(Vec::new()));
        for (index, delay) in delays.iter().enumerate() {
            let log = Arc::clone(&log);
            main.schedule_after(
                start + Duration::from_millis(*delay),
                Box::new(move || log.lock().unwrap().push(index)),
            );
        }
        main_loop.run_for(Duration::from_millis(100));

        let mut expected: Vec<usize> = (0..delays.len()).collect();
        expected.sort_by_key(|&i| (delays[i], i));
        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    }
}
