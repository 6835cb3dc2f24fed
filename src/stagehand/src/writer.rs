use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_queue::SegQueue;

use crate::{Error, Tuning, signal::Signal, worker};

struct Shared<T, E> {
    queue: SegQueue<T>,
    captured_error: Mutex<Option<E>>,
    failed: AtomicBool,
    terminated: AtomicBool,
    worker_exited: AtomicBool,
    signal: Signal,
    poll_interval: Duration,
}

impl<T, E> Shared<T, E> {
    #[inline]
    fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    #[inline]
    fn terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    fn run<F>(&self, mut consume: F)
    where
        F: FnMut(T) -> Result<(), E>,
    {
        while !self.terminated() {
            // After a failure, the worker idles until it is terminated.
            let item = if self.failed() { None } else { self.queue.pop() };

            let Some(item) = item else {
                self.signal.park(self.poll_interval, || {
                    self.terminated() || (!self.failed() && !self.queue.is_empty())
                });
                continue;
            };

            if let Err(e) = consume(item) {
                log::warn!(
                    "write failed; dropping {} queued item(s) on shutdown",
                    self.queue.len()
                );

                *self
                    .captured_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(e);
                self.failed.store(true, Ordering::Release);
            }

            self.signal.notify();
        }
    }

    fn take_error(&self) -> Option<E> {
        self.captured_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Builder for a [`QueuedWriter`] with custom tuning.
#[derive(Clone, Debug, Default)]
pub struct WriterBuilder {
    tuning: Tuning,
    name: Option<String>,
}

impl WriterBuilder {
    /// Creates a builder with the default [`Tuning`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all tuning parameters at once.
    ///
    /// Only the poll interval is relevant to writers.
    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Sets the upper bound for a single idle wait.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.tuning.poll_interval = interval;
        self
    }

    /// Sets the name of the worker thread.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawns the worker thread which passes every written item
    /// to `consume`.
    pub fn spawn<T, E, F>(self, consume: F) -> Result<QueuedWriter<T, E>, Error>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut(T) -> Result<(), E> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            queue: SegQueue::new(),
            captured_error: Mutex::new(None),
            failed: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            worker_exited: AtomicBool::new(false),
            signal: Signal::new(),
            poll_interval: self.tuning.poll_interval,
        });

        let name = self.name.unwrap_or_else(|| worker::WRITER_NAME.into());
        let handle = {
            let body = shared.clone();
            let exit = shared.clone();
            worker::spawn(
                name,
                move || body.run(consume),
                move || {
                    // Unblocks a drain that would otherwise wait forever.
                    exit.worker_exited.store(true, Ordering::Release);
                    exit.signal.notify();
                },
            )?
        };

        Ok(QueuedWriter {
            shared,
            handle: Some(handle),
        })
    }
}

/// A writer which hands items to a consuming operation on a
/// background worker.
///
/// [`write`] never blocks and may be called from many threads at
/// once. Items are consumed in the order they were queued.
///
/// The first error returned by the consuming operation stops all
/// further writes. It is reported by [`dispose`] or [`close`], and
/// the items still queued at that point are dropped.
///
/// Dropping the writer has the effect of [`close`], except that a
/// captured error is only logged.
///
/// [`write`]: QueuedWriter::write
/// [`dispose`]: QueuedWriter::dispose
/// [`close`]: QueuedWriter::close
pub struct QueuedWriter<T, E> {
    shared: Arc<Shared<T, E>>,
    handle: Option<JoinHandle<()>>,
}

impl<T, E> QueuedWriter<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Spawns a writer over `consume` with the default [`Tuning`].
    pub fn new<F>(consume: F) -> Result<Self, Error>
    where
        F: FnMut(T) -> Result<(), E> + Send + 'static,
    {
        WriterBuilder::new().spawn(consume)
    }
}

impl<T, E> QueuedWriter<T, E> {
    /// Queues `item` for writing.
    ///
    /// This succeeds even after the worker has failed; the failure is
    /// only reported on shutdown.
    pub fn write(&self, item: T) {
        self.shared.queue.push(item);
        self.shared.signal.notify();
    }

    /// Gets the number of items not yet picked up by the worker.
    #[inline]
    pub fn queued_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Whether the consuming operation has failed.
    #[inline]
    pub fn has_failed(&self) -> bool {
        self.shared.failed()
    }

    /// Stops the worker and reports the first error it encountered.
    ///
    /// With `finish_writing`, this first waits until every queued
    /// item was handed to the worker or the worker has failed.
    /// Otherwise, pending items are dropped once the item currently
    /// being written is done.
    pub fn dispose(mut self, finish_writing: bool) -> Result<(), E> {
        self.shutdown(finish_writing);
        match self.shared.take_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Writes all queued items and stops the worker.
    ///
    /// Equivalent to `dispose(true)`.
    #[inline]
    pub fn close(self) -> Result<(), E> {
        self.dispose(true)
    }

    fn shutdown(&mut self, finish_writing: bool) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let shared = &*self.shared;
        if finish_writing {
            shared
                .signal
                .wait_until(shared.poll_interval, || {
                    shared.queue.is_empty()
                        || shared.failed()
                        || shared.worker_exited.load(Ordering::Acquire)
                });
        }

        shared.terminated.store(true, Ordering::Release);
        shared.signal.notify();

        worker::join(handle);
    }
}

impl<T, E> Drop for QueuedWriter<T, E> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown(true);
            if self.shared.take_error().is_some() {
                log::warn!("queued writer dropped with an unreported write error");
            }
        }
    }
}
