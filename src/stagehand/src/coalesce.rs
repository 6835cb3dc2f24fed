use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use threadpool::{Builder, ThreadPool};

use crate::worker::WORKER_STACK;

const COALESCE_NAME: &str = "stagehand-coalesce";

fn make_dispatch_pool() -> ThreadPool {
    // Units of one executor never overlap, so a single thread suffices.
    Builder::new()
        .num_threads(1)
        .thread_name(COALESCE_NAME.into())
        .thread_stack_size(WORKER_STACK)
        .build()
}

type RunFn<I, O, E> = Box<dyn Fn(I) -> Result<O, E> + Send + Sync>;

struct State<I, O, E> {
    running: bool,
    pending: Option<I>,
    latest_result: Option<O>,
    last_error: Option<E>,
    completed_runs: u64,
}

struct Shared<I, O, E> {
    state: Mutex<State<I, O, E>>,
    idle: Condvar,
    run: RunFn<I, O, E>,
}

impl<I, O, E> Shared<I, O, E> {
    fn lock(&self) -> MutexGuard<'_, State<I, O, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Body of a dispatched unit. Keeps running as long as new input
    // arrives during a run, so a burst collapses into one trailing run.
    fn drain(&self) {
        loop {
            let input = {
                let mut state = self.lock();
                match state.pending.take() {
                    Some(input) => input,
                    None => {
                        state.running = false;
                        self.idle.notify_all();
                        return;
                    }
                }
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.run)(input)));

            let mut state = self.lock();
            state.completed_runs += 1;
            match outcome {
                Ok(Ok(output)) => state.latest_result = Some(output),
                Ok(Err(e)) => state.last_error = Some(e),
                Err(_) => log::error!("coalesced run panicked; result discarded"),
            }
        }
    }
}

/// An executor which runs an operation at most once at a time and
/// collapses overlapping requests.
///
/// Every call to [`execute`] causes the operation to run with the
/// given input or a newer one. Inputs supplied while a run is in
/// flight replace each other, and only the most recent is passed to
/// a single trailing run.
///
/// Runs are dispatched to a thread pool and their outcome is only
/// observable through [`latest_result`] and [`take_last_error`];
/// errors never reach callers of [`execute`] and do not prevent
/// later runs.
///
/// [`execute`]: CoalescingExecutor::execute
/// [`latest_result`]: CoalescingExecutor::latest_result
/// [`take_last_error`]: CoalescingExecutor::take_last_error
pub struct CoalescingExecutor<I, O, E> {
    shared: Arc<Shared<I, O, E>>,
    pool: ThreadPool,
}

impl<I, O, E> CoalescingExecutor<I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    /// Creates an executor with its own dispatch thread.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        Self::with_pool(make_dispatch_pool(), run)
    }

    /// Creates an executor which dispatches its runs onto `pool`.
    ///
    /// The pool may be shared with other executors.
    pub fn with_pool<F>(pool: ThreadPool, run: F) -> Self
    where
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    running: false,
                    pending: None,
                    latest_result: None,
                    last_error: None,
                    completed_runs: 0,
                }),
                idle: Condvar::new(),
                run: Box::new(run),
            }),
            pool,
        }
    }

    /// Requests a run with `input` and returns immediately.
    ///
    /// When a run is already in flight, `input` is picked up by the
    /// trailing run unless a newer input replaces it first.
    pub fn execute(&self, input: I) {
        let mut state = self.shared.lock();
        state.pending = Some(input);
        if state.running {
            return;
        }

        state.running = true;
        drop(state);

        let shared = self.shared.clone();
        self.pool.execute(move || shared.drain());
    }
}

impl<I, O, E> CoalescingExecutor<I, O, E> {
    /// Gets the output of the most recently completed successful run.
    pub fn latest_result(&self) -> Option<O>
    where
        O: Clone,
    {
        self.shared.lock().latest_result.clone()
    }

    /// Takes the error of the most recent failed run, if any.
    pub fn take_last_error(&self) -> Option<E> {
        self.shared.lock().last_error.take()
    }

    /// Whether a run is in flight or an input awaits its run.
    pub fn is_executing(&self) -> bool {
        let state = self.shared.lock();
        state.running || state.pending.is_some()
    }

    /// Gets the number of runs completed so far, failed ones included.
    pub fn completed_runs(&self) -> u64 {
        self.shared.lock().completed_runs
    }

    /// Blocks until no run is in flight and no input is pending.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while state.running {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
