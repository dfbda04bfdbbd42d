//! The matrix benchmark: a warm-up, a timed loop of matrix operations, and a report of the time
//! taken and what the collector did meanwhile.


use std::fmt;
use std::thread;
use std::time::Duration;

use log::debug;
use rand::Rng;
use stopwatch::Stopwatch;

use crate::appthread::{AppThread, GcRoot};
use crate::collector::CollectorKind;
use crate::constants::{BYTES_PER_MB, ITERATIONS, MATRIX_SIZE, RETAIN_EVERY, SCALAR, SETTLE_MS,
                       WARMUP_ITERATIONS};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::statistics::{GcDelta, GcStats};


/// Benchmark parameters. The defaults are the benchmark proper; tests use smaller ones.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchConfig {
    pub matrix_size: usize,
    pub iterations: usize,
    pub warmup_iterations: usize,
    /// keep every n'th result reachable until the end of the run
    pub retain_every: usize,
    pub scalar: f64,
    /// sleep after the first forced collection, before the baseline is read
    pub settle: Duration,
}


/// The result of one measured run.
#[derive(Clone, Debug)]
pub struct BenchReport {
    pub config: BenchConfig,
    pub collector: CollectorKind,
    pub duration: Duration,
    pub before: GcStats,
    pub after: GcStats,
    pub retained: usize,
}


impl Default for BenchConfig {
    fn default() -> BenchConfig {
        BenchConfig {
            matrix_size: MATRIX_SIZE,
            iterations: ITERATIONS,
            warmup_iterations: WARMUP_ITERATIONS,
            retain_every: RETAIN_EVERY,
            scalar: SCALAR,
            settle: Duration::from_millis(SETTLE_MS),
        }
    }
}


/// Runs the benchmark phases on the current thread's collector.
pub struct Benchmark<R: Rng> {
    config: BenchConfig,
    rng: R,
}


impl<R: Rng> Benchmark<R> {
    pub fn new(config: BenchConfig, rng: R) -> Benchmark<R> {
        Benchmark { config, rng }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Unmeasured runs to get the allocator and the collector's maps up to size.
    pub fn warmup(&mut self) {
        let n = self.config.matrix_size;

        for _ in 0..self.config.warmup_iterations {
            let m1 = Matrix::random(n, n, &mut self.rng);
            let m2 = Matrix::random(n, n, &mut self.rng);
            let _ = m1.multiply(&m2);
        }
    }

    /// The timed loop, bracketed by forced collections and counter snapshots.
    pub fn measure(&mut self) -> Result<BenchReport> {
        AppThread::force_collect();
        thread::sleep(self.config.settle);

        let before = AppThread::stats();
        debug!("baseline {:?}", before);

        let retain_every = self.config.retain_every.max(1);
        let mut results: Vec<GcRoot<Matrix>> = Vec::new();

        let stopwatch = Stopwatch::start_new();
        for i in 0..self.config.iterations {
            let (m1, m2) = self.operands();

            // each step allocates a whole new matrix
            let m3 = m1.multiply(&m2)?;
            let m4 = m1.add(&m2)?;
            let m5 = m3.transpose();
            let m6 = m4.scalar_multiply(self.config.scalar);
            let m7 = m5.add(&m6)?;

            // keep some results to prevent the work being optimized away
            if i % retain_every == 0 {
                results.push(m7);
            }
        }
        let duration = stopwatch.elapsed();

        AppThread::force_collect();
        let after = AppThread::stats();
        debug!("final {:?}", after);

        let report = BenchReport {
            config: self.config.clone(),
            collector: AppThread::kind().unwrap_or_else(CollectorKind::from_build),
            duration,
            before,
            after,
            retained: results.len(),
        };

        // results stay reachable through the final collection
        drop(results);

        Ok(report)
    }

    fn operands(&mut self) -> (GcRoot<Matrix>, GcRoot<Matrix>) {
        let n = self.config.matrix_size;
        (Matrix::random(n, n, &mut self.rng), Matrix::random(n, n, &mut self.rng))
    }
}


impl BenchReport {
    /// Collector activity inside the timed window
    pub fn delta(&self) -> GcDelta {
        self.after.since(&self.before)
    }

    pub fn ops_per_sec(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.config.iterations as f64 / seconds
        } else {
            0.0
        }
    }

    /// Collection pause time as a percentage of the timed window
    pub fn pause_overhead_percent(&self) -> f64 {
        let window = self.duration.as_secs_f64();
        if window > 0.0 {
            self.delta().pause_total.as_secs_f64() / window * 100.0
        } else {
            0.0
        }
    }

    pub fn time_per_iteration(&self) -> Duration {
        match u32::try_from(self.config.iterations) {
            Ok(iterations) if iterations > 0 => self.duration / iterations,
            _ => Duration::default(),
        }
    }
}


impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let delta = self.delta();

        writeln!(f, "=== Results ===")?;
        writeln!(f, "Total Duration: {:?}", self.duration)?;
        writeln!(f, "Operations/sec: {:.2}", self.ops_per_sec())?;
        writeln!(f)?;

        writeln!(f, "=== Memory Statistics ===")?;
        writeln!(f, "Total Allocated: {:.2} MB", delta.total_alloc as f64 / BYTES_PER_MB)?;
        writeln!(f, "Heap Allocated: {:.2} MB", self.after.heap_alloc as f64 / BYTES_PER_MB)?;
        writeln!(f, "Heap Objects: {}", self.after.heap_objects)?;
        writeln!(f)?;

        writeln!(f, "=== Garbage Collection Statistics ===")?;
        writeln!(f, "Number of GCs: {}", delta.num_gc)?;
        writeln!(f, "Total GC Pause: {:?}", delta.pause_total)?;
        if let Some(average) = delta.average_pause() {
            writeln!(f, "Average GC Pause: {:?}", average)?;
            writeln!(f, "GC Pause Overhead: {:.2}%", self.pause_overhead_percent())?;
        }
        writeln!(f, "Last GC Pause: {:?}", self.after.last_pause)?;
        writeln!(f)?;

        writeln!(f, "=== Performance Metrics ===")?;
        writeln!(f, "GC CPU Fraction: {:.2}%", self.after.gc_cpu_fraction * 100.0)?;
        writeln!(f, "Time per iteration: {:?}", self.time_per_iteration())
    }
}


#[cfg(test)]
mod tests {

    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{BenchConfig, BenchReport, Benchmark};
    use crate::appthread::AppThread;
    use crate::collector::CollectorKind;
    use crate::statistics::GcStats;


    fn small_config() -> BenchConfig {
        BenchConfig {
            matrix_size: 8,
            iterations: 40,
            warmup_iterations: 3,
            retain_every: 10,
            scalar: 2.5,
            settle: Duration::from_millis(1),
        }
    }

    fn run(kind: CollectorKind) -> BenchReport {
        AppThread::spawn(kind, || {
            let mut bench = Benchmark::new(small_config(), StdRng::seed_from_u64(5));
            bench.warmup();
            bench.measure()
        })
        .join()
        .expect("benchmark thread panicked")
        .expect("failed to attach collector")
        .expect("benchmark failed")
    }


    #[test]
    fn test_small_run() {
        let kinds = [CollectorKind::Serial, CollectorKind::Parallel { threads: 2 }];

        for kind in kinds.iter().copied() {
            let report = run(kind);
            let delta = report.delta();

            assert_eq!(report.collector, kind);
            assert_eq!(report.retained, 4);

            // the final forced collection is inside the window
            assert!(delta.num_gc >= 1);
            assert!(report.after.pause_total >= report.before.pause_total);

            // 7 matrices of 64 elements per iteration
            let cells = 40 * 7 * 64;
            assert!(delta.total_alloc >= (cells * std::mem::size_of::<f64>()) as u64);

            // only the retained results survive
            assert_eq!(report.after.heap_objects, 4 * (64 + 1));
            assert!(report.ops_per_sec() > 0.0);
        }
    }

    #[test]
    fn test_report_layout() {
        let report = BenchReport {
            config: BenchConfig { iterations: 1000, ..BenchConfig::default() },
            collector: CollectorKind::Serial,
            duration: Duration::from_millis(2000),
            before: GcStats {
                num_gc: 2,
                pause_total: Duration::from_millis(10),
                total_alloc: 1024 * 1024,
                ..GcStats::default()
            },
            after: GcStats {
                num_gc: 12,
                pause_total: Duration::from_millis(110),
                last_pause: Duration::from_millis(7),
                total_alloc: 11 * 1024 * 1024,
                heap_alloc: 512 * 1024,
                heap_objects: 25010,
                gc_cpu_fraction: 0.0125,
            },
            retained: 10,
        };

        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines.contains(&"Total Duration: 2s"));
        assert!(lines.contains(&"Operations/sec: 500.00"));
        assert!(lines.contains(&"Total Allocated: 10.00 MB"));
        assert!(lines.contains(&"Heap Allocated: 0.50 MB"));
        assert!(lines.contains(&"Heap Objects: 25010"));
        assert!(lines.contains(&"Number of GCs: 10"));
        assert!(lines.contains(&"Total GC Pause: 100ms"));
        assert!(lines.contains(&"Average GC Pause: 10ms"));
        assert!(lines.contains(&"GC Pause Overhead: 5.00%"));
        assert!(lines.contains(&"Last GC Pause: 7ms"));
        assert!(lines.contains(&"GC CPU Fraction: 1.25%"));
        assert!(lines.contains(&"Time per iteration: 2ms"));
    }

    #[test]
    fn test_no_collections_omits_average() {
        let report = BenchReport {
            config: BenchConfig::default(),
            collector: CollectorKind::Serial,
            duration: Duration::from_millis(10),
            before: GcStats::default(),
            after: GcStats::default(),
            retained: 0,
        };

        let text = report.to_string();
        assert!(text.contains("Number of GCs: 0"));
        assert!(!text.contains("Average GC Pause"));
        assert!(!text.contains("GC Pause Overhead"));
    }
}
