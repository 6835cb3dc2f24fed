use std::{
    io, panic,
    thread::{self, JoinHandle},
};

pub const READER_NAME: &str = "stagehand-reader";
pub const WRITER_NAME: &str = "stagehand-writer";
pub const WORKER_STACK: usize = 1_048_576;

/// Runs the wrapped closure when dropped, also during unwinding.
struct Defer<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Spawns a named background worker thread running `body`.
///
/// `on_exit` runs on the worker thread after `body` returned or
/// panicked, so that waiters can stop relying on it.
pub fn spawn<F, X>(name: String, body: F, on_exit: X) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
    X: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .stack_size(WORKER_STACK)
        .spawn(move || {
            let _guard = Defer(Some(on_exit));

            let name = thread::current().name().unwrap_or_default().to_owned();
            log::trace!("worker '{name}' starting");
            body();
            log::trace!("worker '{name}' exiting");
        })
}

/// Joins a worker thread, forwarding its panic to the caller.
///
/// A panic is not forwarded when the calling thread is already
/// unwinding, as that would abort the process.
pub fn join(handle: JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        if !thread::panicking() {
            panic::resume_unwind(payload);
        }
    }
}
