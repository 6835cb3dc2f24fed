use std::io;

use thiserror::Error;

/// Errors that occur while setting up a background worker.
#[derive(Debug, Error)]
pub enum Error {
    /// A tuning parameter was out of its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operating system refused to spawn the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Errors returned by [`PrefetchingReader::read`][crate::PrefetchingReader::read].
#[derive(Debug, Error)]
pub enum ReadError<E> {
    /// The producing operation failed while serving this read.
    #[error(transparent)]
    Source(E),

    /// The worker left its loop before it could serve this read.
    ///
    /// This only happens when the producing operation panicked.
    #[error("prefetch worker exited unexpectedly")]
    WorkerExited,
}

impl<E> ReadError<E> {
    /// Gets the source error, if this is one.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Source(e) => Some(e),
            Self::WorkerExited => None,
        }
    }
}
