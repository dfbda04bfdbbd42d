//! # matrix-gc-bench
//!
//! A matrix-multiplication benchmark for comparing two configurations of a mark-and-sweep
//! garbage collector: one that marks and sweeps on the mutator thread, and one that shards the
//! heap across a pool of worker threads.
//!
//! Every matrix element is its own GC-managed object, so a 50×50 matrix is 2501 heap objects and
//! the benchmark loop produces a steady stream of short-lived garbage with a few long-lived
//! survivors.
//!
//! Mutators record allocations and stack root reference count changes in a thread-local journal.
//! The collector replays the journal when it runs, which is only ever at a safepoint: a
//! `GcRoot::new()` that has gone over the allocation budget, or `AppThread::force_collect()`.
//!
//! ## Usage
//!
//! The `matrix-gc-bench` binary runs the benchmark with the collector selected at build time,
//! the `parheap` feature choosing the parallel heap. `gc-compare` compares two saved reports.


mod appthread;
mod bench;
mod collector;
mod compare;
mod constants;
mod error;
mod heap;
mod journal;
mod matrix;
mod parheap;
mod serialheap;
mod statistics;
mod trace;


pub use crate::appthread::{AppThread, Gc, GcBox, GcRoot};
pub use crate::bench::{BenchConfig, BenchReport, Benchmark};
pub use crate::collector::{Collector, CollectorKind};
pub use crate::compare::{improvement, parse_duration_ms, Comparison, Direction, Metrics, Row,
                         Value, Verdict};
pub use crate::constants::*;
pub use crate::error::{Error, Result};
pub use crate::heap::{CollectOps, CollectOutcome, HeapMap, Object, ObjectMeta, RootMap, RootMeta,
                      TraceOps, TraceStack};
pub use crate::journal::Journal;
pub use crate::matrix::Matrix;
pub use crate::parheap::ParHeap;
pub use crate::serialheap::SerialHeap;
pub use crate::statistics::{DefaultLogger, GcDelta, GcStats, StatsLogger};
pub use crate::trace::Trace;
