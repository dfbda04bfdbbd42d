//! The per-thread garbage collector.
//!
//! The collector replays the mutator's journal into a root map of reference counts and into the
//! heap, then runs mark-and-sweep over the heap from the roots. Only objects with a positive
//! root reference count are roots; everything else must be reachable by tracing from one.


use std::cmp::max;
use std::fmt;

use log::{debug, info, log_enabled, warn, Level};
use time::precise_time_ns;

use crate::appthread;
use crate::constants::{DEC, FLAGS_MASK, HEAP_GROWTH_PERCENT, INC, MIN_COLLECT_THRESHOLD, NEW,
                       NEW_INC};
use crate::error::Result;
use crate::heap::{CollectOps, RootMap, RootMeta};
use crate::parheap::ParHeap;
use crate::serialheap::SerialHeap;
use crate::statistics::{DefaultLogger, GcStats, StatsLogger};


/// Which heap implementation a collector runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorKind {
    /// Mark and sweep on the mutator thread
    Serial,
    /// Mark and sweep sharded across a pool of worker threads
    Parallel { threads: usize },
}


impl CollectorKind {
    /// The collector this binary was built for: `Parallel` across all CPUs with the `parheap`
    /// feature, `Serial` without.
    pub fn from_build() -> CollectorKind {
        if cfg!(feature = "parheap") {
            CollectorKind::Parallel { threads: num_cpus::get() }
        } else {
            CollectorKind::Serial
        }
    }

    /// Number of threads doing collection work
    pub fn threads(&self) -> usize {
        match *self {
            CollectorKind::Serial => 1,
            CollectorKind::Parallel { threads } => max(threads, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            CollectorKind::Serial => "serial mark-sweep",
            CollectorKind::Parallel { .. } => "parallel mark-sweep",
        }
    }
}


impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


/// Type that composes all the things we need to run garbage collection for one mutator thread.
pub struct Collector {
    kind: CollectorKind,

    /// Map of rooted object addresses to reference counts
    roots: RootMap,

    /// All GC-managed objects
    heap: Box<dyn CollectOps>,

    /// Something that implements statistics logging
    logger: Box<dyn StatsLogger>,
}


impl Collector {
    pub fn new(kind: CollectorKind) -> Result<Collector> {
        let heap: Box<dyn CollectOps> = match kind {
            CollectorKind::Serial => Box::new(SerialHeap::new()),
            CollectorKind::Parallel { threads } => Box::new(ParHeap::new(threads)?),
        };

        let mut logger = DefaultLogger::new(num_cpus::get());
        logger.mark_start_time();

        debug!("attached {} collector with {} thread(s)", kind, kind.threads());

        Ok(Collector {
            kind,
            roots: RootMap::default(),
            heap,
            logger: Box::new(logger),
        })
    }

    pub fn kind(&self) -> CollectorKind {
        self.kind
    }

    /// Read the mutator's journal, adding new objects to the heap and applying root reference
    /// count changes. Returns the number of journal entries read.
    pub fn read_journal(&mut self) -> usize {
        let Collector { ref mut roots, ref mut heap, ref mut logger, .. } = *self;

        let mut allocated_bytes = 0;
        let mut allocated_objects = 0;

        let entry_count = appthread::read_journal(|entry| {
            let ptr = entry.object.addr();

            match entry.flags & FLAGS_MASK {
                NEW_INC => {
                    heap.add_object(entry.object, entry.size);
                    roots.insert(ptr, RootMeta::one());
                    allocated_bytes += entry.size;
                    allocated_objects += 1;
                }

                NEW => {
                    heap.add_object(entry.object, entry.size);
                    allocated_bytes += entry.size;
                    allocated_objects += 1;
                }

                INC => roots.entry(ptr).or_insert_with(RootMeta::zero).inc(),

                DEC => {
                    let unrooted = match roots.get_mut(&ptr) {
                        Some(meta) => {
                            meta.dec();
                            meta.is_unrooted()
                        }
                        None => {
                            warn!("root count decrement for unknown object {:#x}", ptr);
                            false
                        }
                    };

                    if unrooted {
                        roots.remove(&ptr);
                    }
                }

                _ => unreachable!(),
            }
        });

        logger.add_allocated(allocated_bytes, allocated_objects);

        entry_count
    }

    /// Run a full stop-the-world collection. The mutator is paused for the whole call.
    pub fn collect(&mut self) {
        let start = precise_time_ns();

        let entries = self.read_journal();
        let outcome = self.heap.collect(&self.roots);

        let pause_ns = precise_time_ns() - start;
        // time outside of mark and sweep was spent on this thread alone
        let cpu_ns = pause_ns.saturating_sub(outcome.wall_ns) + outcome.cpu_ns;

        self.logger.add_dropped(outcome.dropped);
        self.logger.current_heap_size(outcome.live_objects, outcome.live_bytes);
        self.logger.add_collection(pause_ns, cpu_ns);

        // pace the next collection on the size of the surviving heap
        let budget = max(outcome.live_bytes * HEAP_GROWTH_PERCENT / 100, MIN_COLLECT_THRESHOLD);
        appthread::reset_allocation_budget(budget);

        if log_enabled!(Level::Debug) {
            self.logger.log(&format!("{} collection: {} journal entries, {} roots, {} live, \
                                      {} dropped, pause {}us",
                                     self.kind,
                                     entries,
                                     self.roots.len(),
                                     outcome.live_objects,
                                     outcome.dropped,
                                     pause_ns / 1000));
        }
    }

    /// Read the current counters. Pending journal entries are accounted for first so that every
    /// allocation made so far is included.
    pub fn stats(&mut self) -> GcStats {
        self.read_journal();
        self.logger.snapshot()
    }

    /// Number of rooted objects, as of the last journal read
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of objects in the heap, as of the last journal read
    pub fn object_count(&self) -> usize {
        self.heap.object_count()
    }
}


impl Drop for Collector {
    fn drop(&mut self) {
        self.read_journal();
        self.heap.shutdown();

        info!("{} collector detached: {}", self.kind, self.logger.summary());
    }
}
