//! Performance counters and statistics


use std::cmp::max;
use std::time::Duration;

use time::precise_time_ns;


/// Type that provides counters for the GC to gain some measure of performance.
pub trait StatsLogger {
    /// mark start of time; CPU fraction is computed against the time elapsed since
    fn mark_start_time(&mut self);

    /// add a completed collection: how long the mutator was stopped and how much CPU time the
    /// collector used, both in nanoseconds
    fn add_collection(&mut self, pause_ns: u64, cpu_ns: u64);

    /// add newly allocated objects
    fn add_allocated(&mut self, bytes: usize, objects: usize);

    /// add a count of dropped objects
    fn add_dropped(&mut self, count: usize);

    /// give the live heap size after a collection
    fn current_heap_size(&mut self, objects: usize, bytes: usize);

    /// read the counters
    fn snapshot(&self) -> GcStats;

    /// one line summary of the counters
    fn summary(&self) -> String;

    /// log something
    fn log(&self, string: &str) {
        log::debug!("{}", string);
    }
}


/// A point-in-time read of the collector's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GcStats {
    /// completed collections
    pub num_gc: u32,
    /// sum of all collection pauses
    pub pause_total: Duration,
    /// pause of the most recent collection
    pub last_pause: Duration,
    /// cumulative bytes allocated
    pub total_alloc: u64,
    /// bytes of allocated objects not yet freed
    pub heap_alloc: u64,
    /// number of allocated objects not yet freed
    pub heap_objects: u64,
    /// fraction of the available CPU time used by the collector, 0.0 to 1.0
    pub gc_cpu_fraction: f64,
}


/// The difference between two snapshots. Counters never run backwards, so the fields saturate at
/// zero rather than wrapping if snapshots are passed in the wrong order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcDelta {
    pub num_gc: u32,
    pub pause_total: Duration,
    pub total_alloc: u64,
}


impl GcStats {
    /// What happened between `before` and this snapshot.
    pub fn since(&self, before: &GcStats) -> GcDelta {
        GcDelta {
            num_gc: self.num_gc.saturating_sub(before.num_gc),
            pause_total: self.pause_total.saturating_sub(before.pause_total),
            total_alloc: self.total_alloc.saturating_sub(before.total_alloc),
        }
    }
}


impl GcDelta {
    /// Mean pause, if there were any collections.
    pub fn average_pause(&self) -> Option<Duration> {
        if self.num_gc > 0 {
            Some(self.pause_total / self.num_gc)
        } else {
            None
        }
    }
}


pub struct DefaultLogger {
    num_cpus: usize,

    num_gc: u32,
    pause_total_ns: u64,
    last_pause_ns: u64,
    cpu_ns: u64,

    total_alloc: u64,
    heap_bytes: u64,
    heap_objects: u64,
    max_heap_objects: u64,

    total_dropped: u64,

    start_time_ns: u64,
}


impl DefaultLogger {
    /// `num_cpus` is the CPU count the collector's CPU fraction is measured against.
    pub fn new(num_cpus: usize) -> DefaultLogger {
        DefaultLogger {
            num_cpus: max(num_cpus, 1),
            num_gc: 0,
            pause_total_ns: 0,
            last_pause_ns: 0,
            cpu_ns: 0,
            total_alloc: 0,
            heap_bytes: 0,
            heap_objects: 0,
            max_heap_objects: 0,
            total_dropped: 0,
            start_time_ns: precise_time_ns(),
        }
    }

    fn cpu_fraction(&self) -> f64 {
        let uptime_ns = max(precise_time_ns().saturating_sub(self.start_time_ns), 1);
        let available_ns = uptime_ns as f64 * self.num_cpus as f64;

        (self.cpu_ns as f64 / available_ns).min(1.0)
    }
}


impl StatsLogger for DefaultLogger {
    fn mark_start_time(&mut self) {
        self.start_time_ns = precise_time_ns();
    }

    fn add_collection(&mut self, pause_ns: u64, cpu_ns: u64) {
        self.num_gc += 1;
        self.pause_total_ns += pause_ns;
        self.last_pause_ns = pause_ns;
        self.cpu_ns += cpu_ns;
    }

    fn add_allocated(&mut self, bytes: usize, objects: usize) {
        self.total_alloc += bytes as u64;
        self.heap_bytes += bytes as u64;
        self.heap_objects += objects as u64;
        self.max_heap_objects = max(self.max_heap_objects, self.heap_objects);
    }

    fn add_dropped(&mut self, count: usize) {
        self.total_dropped += count as u64;
    }

    fn current_heap_size(&mut self, objects: usize, bytes: usize) {
        self.heap_objects = objects as u64;
        self.heap_bytes = bytes as u64;
    }

    fn snapshot(&self) -> GcStats {
        GcStats {
            num_gc: self.num_gc,
            pause_total: Duration::from_nanos(self.pause_total_ns),
            last_pause: Duration::from_nanos(self.last_pause_ns),
            total_alloc: self.total_alloc,
            heap_alloc: self.heap_bytes,
            heap_objects: self.heap_objects,
            gc_cpu_fraction: self.cpu_fraction(),
        }
    }

    fn summary(&self) -> String {
        let uptime_ms = max(precise_time_ns().saturating_sub(self.start_time_ns) / 1_000_000, 1);
        let pause_ms = self.pause_total_ns / 1_000_000;

        // calculate drop rate
        let dropped_per_second = self.total_dropped * 1000 / uptime_ms;

        format!("collections {}; max-heap {}; dropped {} (per second {}); paused {}/{}ms ({}%)",
                self.num_gc,
                self.max_heap_objects,
                self.total_dropped,
                dropped_per_second,
                pause_ms,
                uptime_ms,
                pause_ms * 100 / uptime_ms)
    }
}


#[cfg(test)]
mod tests {

    use std::time::Duration;

    use super::{DefaultLogger, GcStats, StatsLogger};


    #[test]
    fn test_counters() {
        let mut logger = DefaultLogger::new(4);
        logger.mark_start_time();

        logger.add_allocated(800, 100);
        logger.add_allocated(200, 25);
        logger.add_collection(3_000_000, 6_000_000);
        logger.add_dropped(75);
        logger.current_heap_size(50, 400);

        let stats = logger.snapshot();
        assert_eq!(stats.num_gc, 1);
        assert_eq!(stats.pause_total, Duration::from_millis(3));
        assert_eq!(stats.last_pause, Duration::from_millis(3));
        assert_eq!(stats.total_alloc, 1000);
        assert_eq!(stats.heap_alloc, 400);
        assert_eq!(stats.heap_objects, 50);
        assert!(stats.gc_cpu_fraction > 0.0 && stats.gc_cpu_fraction <= 1.0);

        assert!(logger.summary().starts_with("collections 1; max-heap 125; dropped 75"));
    }

    #[test]
    fn test_delta_never_negative() {
        let before = GcStats {
            num_gc: 3,
            pause_total: Duration::from_millis(5),
            total_alloc: 4096,
            ..GcStats::default()
        };
        let after = GcStats {
            num_gc: 5,
            pause_total: Duration::from_millis(9),
            total_alloc: 8192,
            ..GcStats::default()
        };

        let delta = after.since(&before);
        assert_eq!(delta.num_gc, 2);
        assert_eq!(delta.pause_total, Duration::from_millis(4));
        assert_eq!(delta.total_alloc, 4096);
        assert_eq!(delta.average_pause(), Some(Duration::from_millis(2)));

        // the wrong way around saturates instead of wrapping
        let backwards = before.since(&after);
        assert_eq!(backwards.num_gc, 0);
        assert_eq!(backwards.pause_total, Duration::from_millis(0));
        assert_eq!(backwards.total_alloc, 0);
        assert_eq!(backwards.average_pause(), None);
    }
}
