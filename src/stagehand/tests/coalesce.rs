use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use stagehand::CoalescingExecutor;
use threadpool::ThreadPool;

#[derive(Debug, PartialEq)]
struct Odd(u32);

/// Records every input and tracks the highest number of overlapping runs.
#[derive(Default)]
struct Tracker {
    inputs: Mutex<Vec<u32>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Tracker {
    fn enter(&self, input: u32) {
        self.inputs.lock().unwrap().push(input);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn coalesces_burst_into_one_trailing_run() {
    let tracker = Arc::new(Tracker::default());
    let (started_tx, started_rx) = mpsc::channel();
    let started_tx = Mutex::new(started_tx);

    let executor = {
        let tracker = tracker.clone();
        CoalescingExecutor::new(move |input: u32| {
            tracker.enter(input);
            let _ = started_tx.lock().unwrap().send(input);
            thread::sleep(Duration::from_millis(50));
            tracker.leave();
            Ok::<_, Odd>(input * 2)
        })
    };

    assert_eq!(executor.latest_result(), None);

    executor.execute(1);
    assert_eq!(started_rx.recv().unwrap(), 1);

    executor.execute(2);
    executor.execute(3);
    assert!(executor.is_executing());

    executor.wait_idle();

    assert!(!executor.is_executing());
    assert_eq!(executor.latest_result(), Some(6));
    assert_eq!(executor.completed_runs(), 2);
    assert_eq!(*tracker.inputs.lock().unwrap(), [1, 3]);
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
}

#[test]
fn never_runs_concurrently_under_contention() {
    let tracker = Arc::new(Tracker::default());
    let executor = {
        let tracker = tracker.clone();
        CoalescingExecutor::new(move |input: u32| {
            tracker.enter(input);
            thread::sleep(Duration::from_millis(1));
            tracker.leave();
            Ok::<_, Odd>(input)
        })
    };

    thread::scope(|s| {
        for t in 0..4 {
            let executor = &executor;
            s.spawn(move || {
                for i in 0..50 {
                    executor.execute(t * 100 + i);
                }
            });
        }
    });
    executor.wait_idle();

    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);

    // The last input to be recorded is always the one that ran last.
    let last_input = *tracker.inputs.lock().unwrap().last().unwrap();
    assert_eq!(executor.latest_result(), Some(last_input));
}

#[test]
fn every_request_is_eventually_served() {
    let executor = CoalescingExecutor::new(|input: u32| Ok::<_, Odd>(input));

    for i in 1..=200 {
        executor.execute(i);
        if i % 50 == 0 {
            executor.wait_idle();
            assert_eq!(executor.latest_result(), Some(i));
        }
    }
}

#[test]
fn errors_stay_observable_only() {
    let executor = CoalescingExecutor::new(|input: u32| {
        if input % 2 == 1 {
            Err(Odd(input))
        } else {
            Ok(input / 2)
        }
    });

    executor.execute(7);
    executor.wait_idle();
    assert_eq!(executor.take_last_error(), Some(Odd(7)));
    assert_eq!(executor.take_last_error(), None);
    assert_eq!(executor.latest_result(), None);

    // A failure does not keep later requests from running.
    executor.execute(8);
    executor.wait_idle();
    assert_eq!(executor.latest_result(), Some(4));
    assert_eq!(executor.completed_runs(), 2);
}

#[test]
fn survives_a_panicking_run() {
    let executor = CoalescingExecutor::new(|input: u32| {
        if input == 0 {
            panic!("cannot handle zero");
        }
        Ok::<_, Odd>(input)
    });

    executor.execute(0);
    executor.wait_idle();
    assert_eq!(executor.latest_result(), None);

    executor.execute(5);
    executor.wait_idle();
    assert_eq!(executor.latest_result(), Some(5));
}

#[test]
fn shares_a_dispatch_pool() {
    let pool = ThreadPool::new(2);
    let calls = Arc::new(AtomicUsize::new(0));

    let executors: Vec<_> = (0..3)
        .map(|_| {
            let calls = calls.clone();
            CoalescingExecutor::with_pool(pool.clone(), move |input: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Odd>(input + 1)
            })
        })
        .collect();

    for (i, executor) in executors.iter().enumerate() {
        executor.execute(i as u32);
    }
    for executor in &executors {
        executor.wait_idle();
    }

    let results: Vec<_> = executors.iter().map(|e| e.latest_result()).collect();
    assert_eq!(results, [Some(1), Some(2), Some(3)]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
