//! A parallel collector for the entire heap.


use std::cmp::max;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};
use time::precise_time_ns;

use crate::error::Result;
use crate::heap::{drop_all, mark_from, sweep_map, CollectOps, CollectOutcome, HeapMap, Object,
                  ObjectMeta, RootMap, TraceStack};


/// This references all known GC-managed objects and handles marking and sweeping; parallel mark
/// and sweep version.
///
/// Objects are traced and dropped on the pool's worker threads while the mutator is stopped.
pub struct ParHeap {
    num_threads: usize,
    pool: ThreadPool,
    /// The heap is split by address into one map per thread so that each can be swept separately
    shards: Vec<HeapMap>,
}


impl ParHeap {
    /// In this heap implementation, work is split out into a thread pool. There is no knowing,
    /// though, how much work each split actually represents. One thread may receive a
    /// disproportionate amount of tracing or sweeping.
    pub fn new(num_threads: usize) -> Result<ParHeap> {
        let num_threads = max(num_threads, 1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("gc-worker-{}", index))
            .build()?;

        Ok(ParHeap {
            num_threads,
            pool,
            shards: (0..num_threads).map(|_| HeapMap::default()).collect(),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// A parallel mark implementation:
    ///  * shares a borrow of all the heap shards among the thread pool
    ///  * divides the roots among the thread pool
    ///  * each thread traces from it's own slice of roots
    /// Returns the CPU time spent by all threads.
    fn mark(&self, roots: &RootMap) -> u64 {
        let root_ptrs: Vec<usize> = roots.keys().copied().collect();
        let threads = self.num_threads();
        let chunk_size = max(1, (root_ptrs.len() + threads - 1) / threads);

        let busy_ns = AtomicU64::new(0);
        let shards = &self.shards;

        self.pool.scope(|scope| {
            for chunk in root_ptrs.chunks(chunk_size) {
                let busy_ns = &busy_ns;

                scope.spawn(move |_| {
                    let start = precise_time_ns();
                    let lookup = move |ptr: usize| {
                        shards[shard_index(ptr, shards.len())].get(&ptr)
                    };

                    let mut stack = TraceStack::new();

                    for &root_ptr in chunk {
                        if let Some(meta) = lookup(root_ptr) {
                            mark_from(meta, &mut stack, lookup);
                        }
                    }

                    busy_ns.fetch_add(precise_time_ns() - start, Ordering::Relaxed);
                });
            }
        });

        busy_ns.into_inner()
    }

    /// A parallel sweep implementation: each thread is given a separate shard to sweep.
    /// Returns a tuple of (live_object_count, live_bytes, dropped_object_count, cpu_ns)
    fn sweep(&mut self) -> (usize, usize, usize, u64) {
        // set counters
        let live_count = AtomicUsize::new(0);
        let live_bytes = AtomicUsize::new(0);
        let drop_count = AtomicUsize::new(0);
        let busy_ns = AtomicU64::new(0);

        let ParHeap { ref pool, ref mut shards, .. } = *self;

        pool.scope(|scope| {
            for shard in shards.iter_mut() {

                // pass a reference to each counter to each thread
                let live_count = &live_count;
                let live_bytes = &live_bytes;
                let drop_count = &drop_count;
                let busy_ns = &busy_ns;

                scope.spawn(move |_| {
                    let start = precise_time_ns();

                    let (live, bytes, dropped) = sweep_map(shard);

                    // write out the counters
                    live_count.fetch_add(live, Ordering::Relaxed);
                    live_bytes.fetch_add(bytes, Ordering::Relaxed);
                    drop_count.fetch_add(dropped, Ordering::Relaxed);
                    busy_ns.fetch_add(precise_time_ns() - start, Ordering::Relaxed);
                });
            }
        });

        (live_count.into_inner(),
         live_bytes.into_inner(),
         drop_count.into_inner(),
         busy_ns.into_inner())
    }
}


impl CollectOps for ParHeap {
    fn add_object(&mut self, object: Object, size: usize) {
        let ptr = object.addr();
        let index = shard_index(ptr, self.shards.len());
        self.shards[index].insert(ptr, ObjectMeta::new(object, size));
    }

    fn collect(&mut self, roots: &RootMap) -> CollectOutcome {
        let start = precise_time_ns();

        let mark_ns = self.mark(roots);
        let (live_objects, live_bytes, dropped, sweep_ns) = self.sweep();

        CollectOutcome {
            live_objects,
            live_bytes,
            dropped,
            wall_ns: precise_time_ns() - start,
            cpu_ns: mark_ns + sweep_ns,
        }
    }

    fn object_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    fn shutdown(&mut self) {
        for shard in self.shards.iter_mut() {
            drop_all(shard);
        }
    }
}


/// Pointers are at least word-aligned, so the low bits carry no information.
#[inline]
fn shard_index(ptr: usize, num_shards: usize) -> usize {
    (ptr >> 4) % num_shards
}
