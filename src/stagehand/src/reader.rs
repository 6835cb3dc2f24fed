use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
    time::Duration,
};

use crate::{Error, ReadError, Tuning, worker};

struct State<T, E> {
    buffer: VecDeque<T>,
    // Blocked `read` calls not yet claimed by the worker.
    pending_requests: usize,
    suppress_prefetch: bool,
    pending_error: Option<E>,
    terminated: bool,
    worker_exited: bool,
}

impl<T, E> State<T, E> {
    fn withdraw_request(&mut self) {
        self.pending_requests = self.pending_requests.saturating_sub(1);
    }
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    cvar: Condvar,
    poll_interval: Duration,
    look_ahead: usize,
}

impl<T, E> Shared<T, E> {
    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State<T, E>>) -> MutexGuard<'a, State<T, E>> {
        if self.poll_interval.is_zero() {
            self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
        } else {
            match self.cvar.wait_timeout(guard, self.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            }
        }
    }

    fn run<F>(&self, mut produce: F)
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut state = self.lock();
        loop {
            if state.terminated {
                break;
            }

            // A blocked read is served from the buffer when possible, and
            // is not claimed while an error for an earlier one still waits
            // to be picked up.
            let manual = state.pending_requests > 0
                && state.buffer.is_empty()
                && state.pending_error.is_none();
            let speculative =
                !state.suppress_prefetch && state.buffer.len() < self.look_ahead;

            if !manual && !speculative {
                state = self.wait(state);
                continue;
            }

            if manual {
                state.pending_requests -= 1;
            }

            drop(state);
            let result = produce();
            state = self.lock();

            match result {
                Ok(item) => state.buffer.push_back(item),
                Err(e) if manual => state.pending_error = Some(e),
                Err(_) => {
                    log::debug!("speculative production failed; suspending prefetch");
                    state.suppress_prefetch = true;
                }
            }

            self.cvar.notify_all();
        }
    }
}

/// Builder for a [`PrefetchingReader`] with custom tuning.
#[derive(Clone, Debug, Default)]
pub struct ReaderBuilder {
    tuning: Tuning,
    name: Option<String>,
}

impl ReaderBuilder {
    /// Creates a builder with the default [`Tuning`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all tuning parameters at once.
    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Sets the upper bound for a single idle wait.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.tuning.poll_interval = interval;
        self
    }

    /// Sets how many items may be produced ahead of demand.
    pub fn look_ahead(mut self, count: usize) -> Self {
        self.tuning.look_ahead = count;
        self
    }

    /// Sets the name of the worker thread.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawns the worker thread, which immediately starts calling
    /// `produce` to fill the look-ahead buffer.
    pub fn spawn<T, E, F>(self, produce: F) -> Result<PrefetchingReader<T, E>, Error>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        if self.tuning.look_ahead == 0 {
            return Err(Error::InvalidArgument("look-ahead count must be positive"));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                buffer: VecDeque::with_capacity(self.tuning.look_ahead.min(1024)),
                pending_requests: 0,
                suppress_prefetch: false,
                pending_error: None,
                terminated: false,
                worker_exited: false,
            }),
            cvar: Condvar::new(),
            poll_interval: self.tuning.poll_interval,
            look_ahead: self.tuning.look_ahead,
        });

        let name = self.name.unwrap_or_else(|| worker::READER_NAME.into());
        let handle = {
            let body = shared.clone();
            let exit = shared.clone();
            worker::spawn(
                name,
                move || body.run(produce),
                move || {
                    exit.lock().worker_exited = true;
                    exit.cvar.notify_all();
                },
            )?
        };

        Ok(PrefetchingReader {
            shared,
            handle: Some(handle),
        })
    }
}

/// A reader which produces items on a background worker ahead of
/// demand.
///
/// The worker keeps up to `look_ahead` items buffered. A [`read`]
/// only blocks when the buffer is empty, in which case the worker
/// produces an item specifically for that call.
///
/// When producing an item speculatively fails, the error is dropped
/// and no further items are produced ahead of demand. Blocked reads
/// still trigger productions and receive their errors, so an
/// exhausted source reports its error on every subsequent read.
///
/// [`read`]: PrefetchingReader::read
pub struct PrefetchingReader<T, E> {
    shared: Arc<Shared<T, E>>,
    handle: Option<JoinHandle<()>>,
}

impl<T, E> PrefetchingReader<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Spawns a reader over `produce` with the default [`Tuning`].
    pub fn new<F>(produce: F) -> Result<Self, Error>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        ReaderBuilder::new().spawn(produce)
    }
}

impl<T, E> PrefetchingReader<T, E> {
    /// Gets the configured look-ahead count.
    #[inline]
    pub fn look_ahead(&self) -> usize {
        self.shared.look_ahead
    }

    /// Gets the number of items currently buffered.
    pub fn cached_count(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// Gets the next item in production order.
    ///
    /// Blocks when no item is buffered yet. An error from a production
    /// made on behalf of a blocked read is returned exactly once.
    pub fn read(&mut self) -> Result<T, ReadError<E>> {
        let shared = &*self.shared;
        let mut state = shared.lock();

        if let Some(item) = state.buffer.pop_front() {
            return Ok(item);
        }

        state.pending_requests += 1;
        shared.cvar.notify_all();

        loop {
            if let Some(item) = state.buffer.pop_front() {
                state.withdraw_request();
                return Ok(item);
            }
            if let Some(e) = state.pending_error.take() {
                state.withdraw_request();
                return Err(ReadError::Source(e));
            }
            if state.worker_exited {
                state.withdraw_request();
                return Err(ReadError::WorkerExited);
            }

            state = shared.wait(state);
        }
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// A production in progress is completed first. Items still in
    /// the buffer are discarded.
    pub fn dispose(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.lock().terminated = true;
            self.shared.cvar.notify_all();

            worker::join(handle);
        }
    }
}

impl<T, E> Iterator for PrefetchingReader<T, E> {
    type Item = Result<T, ReadError<E>>;

    /// Reads the next item, ending only once the worker is gone.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Err(ReadError::WorkerExited) => None,
            res => Some(res),
        }
    }
}

impl<T, E> Drop for PrefetchingReader<T, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
