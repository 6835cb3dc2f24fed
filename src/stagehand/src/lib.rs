//! Background worker primitives for decoupling blocking I/O.
//!
//! # Motivation
//!
//! Many data sources and sinks only offer a synchronous interface
//! that hands out or accepts one item at a time, e.g. rows pulled
//! from a delimited file or records pushed to a slow sink.
//!
//! The types in this crate move such operations onto a dedicated
//! background worker so that the foreground thread only ever waits
//! when there is genuinely nothing to do for it.
//!
//! # Design
//!
//! Every primitive owns exactly one logical stream of items:
//!
//! - [`PrefetchingReader`] produces items ahead of demand into a
//!   bounded look-ahead buffer.
//!
//! - [`QueuedWriter`] accepts items without blocking and consumes
//!   them strictly in order on its worker.
//!
//! - [`CoalescingExecutor`] collapses bursts of requests into at most
//!   one in-flight run plus one trailing run with the newest input.
//!
//! None of them depends on the others.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub use config::Tuning;

mod coalesce;
pub use coalesce::CoalescingExecutor;

mod error;
pub use error::*;

mod reader;
pub use reader::{PrefetchingReader, ReaderBuilder};

mod signal;

mod worker;

mod writer;
pub use writer::{QueuedWriter, WriterBuilder};
