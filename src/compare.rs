//! Side by side comparison of two saved benchmark reports.
//!
//! The report text is the only interface between runs: each metric is read back from its report
//! line, so reports from separately built binaries can be compared.


use std::fmt;
use std::fs;
use std::path::Path;

use fnv::FnvHashMap;

use crate::error::{Error, Result};


/// Which way a metric should move for the candidate to count as better.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Lower,
    Higher,
    Neutral,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    /// `Debug` formatted `Duration`, compared in milliseconds
    Duration,
    /// plain number, optionally followed by `%` or `MB`
    Number,
}


/// A metric as it appears in the report and in the comparison table
struct MetricDef {
    key: &'static str,
    prefix: &'static str,
    name: &'static str,
    unit: Unit,
    direction: Direction,
}


const METRICS: [MetricDef; 11] = [
    MetricDef {
        key: "duration",
        prefix: "Total Duration:",
        name: "Total Duration",
        unit: Unit::Duration,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "ops_per_sec",
        prefix: "Operations/sec:",
        name: "Operations/sec",
        unit: Unit::Number,
        direction: Direction::Higher,
    },
    MetricDef {
        key: "total_alloc",
        prefix: "Total Allocated:",
        name: "Total Memory Allocated",
        unit: Unit::Number,
        direction: Direction::Neutral,
    },
    MetricDef {
        key: "heap_alloc",
        prefix: "Heap Allocated:",
        name: "Heap Allocated",
        unit: Unit::Number,
        direction: Direction::Neutral,
    },
    MetricDef {
        key: "heap_objects",
        prefix: "Heap Objects:",
        name: "Heap Objects",
        unit: Unit::Number,
        direction: Direction::Neutral,
    },
    MetricDef {
        key: "num_gc",
        prefix: "Number of GCs:",
        name: "Number of GCs",
        unit: Unit::Number,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "total_pause",
        prefix: "Total GC Pause:",
        name: "Total GC Pause",
        unit: Unit::Duration,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "avg_pause",
        prefix: "Average GC Pause:",
        name: "Average GC Pause",
        unit: Unit::Duration,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "gc_pause_overhead",
        prefix: "GC Pause Overhead:",
        name: "GC Pause Overhead",
        unit: Unit::Number,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "gc_cpu_fraction",
        prefix: "GC CPU Fraction:",
        name: "GC CPU Fraction",
        unit: Unit::Number,
        direction: Direction::Lower,
    },
    MetricDef {
        key: "time_per_iter",
        prefix: "Time per iteration:",
        name: "Time per Iteration",
        unit: Unit::Duration,
        direction: Direction::Lower,
    },
];


/// One metric read from a report: the text as printed and its numeric value.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub raw: String,
    pub number: f64,
}


/// The metrics found in one report, keyed by metric key.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    values: FnvHashMap<&'static str, Value>,
}


/// Convert a `Debug` formatted duration such as `1.5s`, `12.25ms`, `830µs` or `40ns` to
/// milliseconds.
pub fn parse_duration_ms(text: &str) -> Option<f64> {
    let text = text.trim();

    // longest suffixes first, every one of them ends in 's'
    let (number, scale) = if let Some(n) = text.strip_suffix("ns") {
        (n, 1e-6)
    } else if let Some(n) = text.strip_suffix("µs") {
        (n, 1e-3)
    } else if let Some(n) = text.strip_suffix("us") {
        (n, 1e-3)
    } else if let Some(n) = text.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1e3)
    } else {
        return None;
    };

    number.trim().parse::<f64>().ok().map(|n| n * scale)
}


fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_suffix('%').or_else(|| text.strip_suffix("MB")).unwrap_or(text);

    text.trim().parse::<f64>().ok()
}


/// Percentage by which `candidate` is below `baseline`. Positive means the candidate is smaller.
/// Undefined for a zero baseline.
pub fn improvement(baseline: f64, candidate: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((baseline - candidate) / baseline * 100.0)
    }
}


impl Metrics {
    /// Read every recognized metric line out of a report. Unrecognized lines are ignored.
    pub fn parse(report: &str) -> Metrics {
        let mut values = FnvHashMap::default();

        for line in report.lines().map(str::trim) {
            for def in METRICS.iter() {
                let rest = match line.strip_prefix(def.prefix) {
                    Some(rest) => rest.trim(),
                    None => continue,
                };

                let number = match def.unit {
                    Unit::Duration => parse_duration_ms(rest),
                    Unit::Number => parse_number(rest),
                };

                if let Some(number) = number {
                    // the first occurrence wins
                    values.entry(def.key).or_insert(Value { raw: rest.to_string(), number });
                }
            }
        }

        Metrics { values }
    }

    /// Read and parse a saved report. A report with no recognizable metrics is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Metrics> {
        let path = path.as_ref();

        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let metrics = Metrics::parse(&text);
        if metrics.is_empty() {
            return Err(Error::Unparsable(path.to_path_buf()));
        }

        Ok(metrics)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}


/// One line of the comparison table.
#[derive(Clone, Debug)]
pub struct Row {
    pub name: &'static str,
    pub baseline: String,
    pub candidate: String,
    pub direction: Direction,
    /// `improvement(baseline, candidate)`
    pub change: Option<f64>,
}


impl Row {
    /// Whether the candidate moved in the desired direction
    pub fn improved(&self) -> bool {
        match (self.direction, self.change) {
            (Direction::Lower, Some(change)) => change > 0.0,
            (Direction::Higher, Some(change)) => change < 0.0,
            _ => false,
        }
    }

    fn change_text(&self) -> String {
        let change = match self.change {
            Some(change) => change,
            None => return "N/A".to_string(),
        };

        // for higher-is-better metrics show the increase rather than the reduction
        let shown = match self.direction {
            Direction::Higher => -change,
            _ => change,
        };

        if self.improved() {
            format!("{:+.2}% ✓", shown)
        } else {
            format!("{:+.2}%", shown)
        }
    }
}


/// How much the candidate reduced collector CPU use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Excellent,
    Good,
    Moderate,
    Small,
    Limited,
}


impl Verdict {
    pub fn from_reduction(reduction: Option<f64>) -> Verdict {
        match reduction {
            Some(r) if r >= 30.0 => Verdict::Excellent,
            Some(r) if r >= 15.0 => Verdict::Good,
            Some(r) if r >= 5.0 => Verdict::Moderate,
            Some(r) if r > 0.0 => Verdict::Small,
            _ => Verdict::Limited,
        }
    }

    fn describe(&self) -> &'static str {
        match *self {
            Verdict::Excellent => {
                "Excellent! The candidate shows significant GC improvement (>30%)"
            }
            Verdict::Good => "Good! The candidate shows solid GC improvement (15-30%)",
            Verdict::Moderate => "Moderate improvement from the candidate (5-15%)",
            Verdict::Small => "Small improvement from the candidate (<5%)",
            Verdict::Limited => "Limited or no improvement observed.",
        }
    }
}


/// Two parsed reports and the table built from them.
pub struct Comparison {
    baseline: Metrics,
    candidate: Metrics,
}


impl Comparison {
    pub fn new(baseline: Metrics, candidate: Metrics) -> Comparison {
        Comparison { baseline, candidate }
    }

    /// Table rows for every metric present in both reports, in report order.
    pub fn rows(&self) -> Vec<Row> {
        METRICS.iter()
            .filter_map(|def| {
                let baseline = self.baseline.get(def.key)?;
                let candidate = self.candidate.get(def.key)?;

                Some(Row {
                    name: def.name,
                    baseline: baseline.raw.clone(),
                    candidate: candidate.raw.clone(),
                    direction: def.direction,
                    change: improvement(baseline.number, candidate.number),
                })
            })
            .collect()
    }

    fn reduction(&self, key: &str) -> Option<f64> {
        let baseline = self.baseline.get(key)?;
        let candidate = self.candidate.get(key)?;

        improvement(baseline.number, candidate.number)
    }

    /// Percentage reduction in collector CPU fraction
    pub fn gc_cpu_reduction(&self) -> Option<f64> {
        self.reduction("gc_cpu_fraction")
    }

    /// Percentage reduction in total run time
    pub fn duration_reduction(&self) -> Option<f64> {
        self.reduction("duration")
    }

    /// Percentage reduction in total collection pause
    pub fn pause_reduction(&self) -> Option<f64> {
        self.reduction("total_pause")
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_reduction(self.gc_cpu_reduction())
    }
}


fn banner(f: &mut fmt::Formatter, title: &str) -> fmt::Result {
    writeln!(f, "{}", "=".repeat(80))?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", "=".repeat(80))?;
    writeln!(f)
}


impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        banner(f, "DETAILED GC BENCHMARK COMPARISON")?;

        writeln!(f,
                 "{:<30} | {:<20} | {:<20} | {:<15}",
                 "Metric",
                 "Baseline",
                 "Candidate",
                 "Change")?;
        writeln!(f, "{}", "-".repeat(95))?;

        for row in self.rows() {
            writeln!(f,
                     "{:<30} | {:<20} | {:<20} | {:<15}",
                     row.name,
                     row.baseline,
                     row.candidate,
                     row.change_text())?;
        }
        writeln!(f)?;

        banner(f, "SUMMARY")?;

        // a zero change is not worth a line
        let summary = [
            ("GC CPU Time Reduction", self.gc_cpu_reduction()),
            ("Overall Performance Improvement", self.duration_reduction()),
            ("GC Pause Reduction", self.pause_reduction()),
        ];
        for &(label, value) in summary.iter() {
            if let Some(value) = value.filter(|v| *v != 0.0) {
                writeln!(f, "{}: {:.2}%", label, value)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Legend:")?;
        writeln!(f, "  ✓ = Improved in desired direction")?;
        writeln!(f, "  Lower is better for: Duration, GC metrics, Pause times")?;
        writeln!(f, "  Higher is better for: Operations/sec")?;
        writeln!(f)?;

        banner(f, "ANALYSIS")?;

        let verdict = self.verdict();
        writeln!(f, "{}", verdict.describe())?;
        if verdict == Verdict::Limited {
            writeln!(f, "This workload may not benefit from the candidate collector.")?;
            writeln!(f, "Consider:")?;
            writeln!(f, "  - Increasing matrix size for more objects per collection")?;
            writeln!(f, "  - Different allocation patterns")?;
            writeln!(f, "  - Your specific workload characteristics")?;
        } else {
            writeln!(f)?;
            writeln!(f, "This workload benefits from splitting mark and sweep across threads.")?;
            writeln!(f, "The uniform object sizes shard evenly between workers.")?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {

    use std::time::Duration;

    use super::{improvement, parse_duration_ms, Comparison, Direction, Metrics, Verdict};
    use crate::bench::{BenchConfig, BenchReport};
    use crate::collector::CollectorKind;
    use crate::error::Error;
    use crate::statistics::GcStats;


    const SERIAL: &str = "\
=== Matrix GC Benchmark ===
Collector: serial mark-sweep

=== Results ===
Total Duration: 2.5s
Operations/sec: 400.00

=== Memory Statistics ===
Total Allocated: 1000.00 MB
Heap Allocated: 0.50 MB
Heap Objects: 25010

=== Garbage Collection Statistics ===
Number of GCs: 200
Total GC Pause: 500ms
Average GC Pause: 2.5ms
GC Pause Overhead: 20.00%
Last GC Pause: 2ms

=== Performance Metrics ===
GC CPU Fraction: 10.00%
Time per iteration: 2.5ms
";

    const PARALLEL: &str = "\
=== Results ===
Total Duration: 2s
Operations/sec: 500.00
Total Allocated: 1000.00 MB
Heap Allocated: 0.50 MB
Heap Objects: 25010
Number of GCs: 200
Total GC Pause: 250ms
Average GC Pause: 1.25ms
GC Pause Overhead: 12.50%
GC CPU Fraction: 8.00%
Time per iteration: 2ms
";


    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }


    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_ms("1.5s"), Some(1500.0));
        assert_eq!(parse_duration_ms("12.25ms"), Some(12.25));
        assert_eq!(parse_duration_ms("0ns"), Some(0.0));
        assert!(close(parse_duration_ms("830µs").unwrap(), 0.83));
        assert!(close(parse_duration_ms("830us").unwrap(), 0.83));
        assert!(close(parse_duration_ms("40ns").unwrap(), 0.00004));
        assert_eq!(parse_duration_ms("12"), None);
        assert_eq!(parse_duration_ms("fast"), None);
    }

    #[test]
    fn test_parse_report() {
        let metrics = Metrics::parse(SERIAL);

        assert_eq!(metrics.len(), 11);
        assert_eq!(metrics.get("duration").unwrap().number, 2500.0);
        assert_eq!(metrics.get("duration").unwrap().raw, "2.5s");
        assert_eq!(metrics.get("total_alloc").unwrap().number, 1000.0);
        assert_eq!(metrics.get("gc_pause_overhead").unwrap().number, 20.0);
        assert_eq!(metrics.get("heap_objects").unwrap().number, 25010.0);

        // last pause is not compared
        assert!(metrics.get("last_pause").is_none());
    }

    #[test]
    fn test_parse_own_report() {
        let report = BenchReport {
            config: BenchConfig::default(),
            collector: CollectorKind::Serial,
            duration: Duration::from_micros(1_234_567),
            before: GcStats::default(),
            after: GcStats {
                num_gc: 4,
                pause_total: Duration::from_micros(830),
                gc_cpu_fraction: 0.02,
                ..GcStats::default()
            },
            retained: 10,
        };

        let metrics = Metrics::parse(&report.to_string());

        assert_eq!(metrics.len(), 11);
        assert!(close(metrics.get("duration").unwrap().number, 1234.567));
        assert!(close(metrics.get("total_pause").unwrap().number, 0.83));
        assert_eq!(metrics.get("num_gc").unwrap().number, 4.0);
        assert_eq!(metrics.get("gc_cpu_fraction").unwrap().number, 2.0);
    }

    #[test]
    fn test_improvement() {
        assert_eq!(improvement(200.0, 150.0), Some(25.0));
        assert_eq!(improvement(100.0, 120.0), Some(-20.0));
        assert_eq!(improvement(0.0, 5.0), None);
    }

    #[test]
    fn test_comparison() {
        let comparison = Comparison::new(Metrics::parse(SERIAL), Metrics::parse(PARALLEL));
        let rows = comparison.rows();

        assert_eq!(rows.len(), 11);

        let duration = &rows[0];
        assert_eq!(duration.name, "Total Duration");
        assert_eq!(duration.direction, Direction::Lower);
        assert!(close(duration.change.unwrap(), 20.0));
        assert!(duration.improved());

        let ops = &rows[1];
        assert_eq!(ops.direction, Direction::Higher);
        assert_eq!(ops.change, Some(-25.0));
        assert!(ops.improved());

        let allocated = &rows[2];
        assert_eq!(allocated.direction, Direction::Neutral);
        assert!(!allocated.improved());

        assert!(close(comparison.gc_cpu_reduction().unwrap(), 20.0));
        assert_eq!(comparison.pause_reduction(), Some(50.0));
        assert_eq!(comparison.verdict(), Verdict::Good);

        let text = comparison.to_string();
        assert!(text.contains("Total Duration"));
        assert!(text.contains("+20.00% ✓"));
        assert!(text.contains("+25.00% ✓"));
        assert!(text.contains("GC CPU Time Reduction: 20.00%"));
        assert!(text.contains("GC Pause Reduction: 50.00%"));
        assert!(text.contains("Good!"));
    }

    #[test]
    fn test_missing_metrics_are_skipped() {
        let partial = Metrics::parse("Total Duration: 3s\nNumber of GCs: 0\n");
        let comparison = Comparison::new(Metrics::parse(SERIAL), partial);
        let rows = comparison.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].name, "Number of GCs");
        assert_eq!(rows[1].change, Some(100.0));
        assert_eq!(comparison.verdict(), Verdict::Limited);
    }

    #[test]
    fn test_verdict_bands() {
        assert_eq!(Verdict::from_reduction(Some(45.0)), Verdict::Excellent);
        assert_eq!(Verdict::from_reduction(Some(30.0)), Verdict::Excellent);
        assert_eq!(Verdict::from_reduction(Some(15.0)), Verdict::Good);
        assert_eq!(Verdict::from_reduction(Some(7.5)), Verdict::Moderate);
        assert_eq!(Verdict::from_reduction(Some(0.1)), Verdict::Small);
        assert_eq!(Verdict::from_reduction(Some(0.0)), Verdict::Limited);
        assert_eq!(Verdict::from_reduction(Some(-12.0)), Verdict::Limited);
        assert_eq!(Verdict::from_reduction(None), Verdict::Limited);
    }

    #[test]
    fn test_load_errors() {
        match Metrics::load("no/such/report.txt") {
            Err(Error::Io { path, .. }) => assert!(path.ends_with("report.txt")),
            _ => panic!("expected an io error"),
        }

        let path = std::env::temp_dir().join(format!("gc-compare-{}.txt", std::process::id()));
        std::fs::write(&path, "nothing to see here\n").expect("write temp report");

        let result = Metrics::load(&path);
        let _ = std::fs::remove_file(&path);

        match result {
            Err(Error::Unparsable(p)) => assert_eq!(p, path),
            _ => panic!("expected an unparsable report"),
        }
    }
}
