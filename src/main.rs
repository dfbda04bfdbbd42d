use std::process;

use env_logger::Env;

use matrix_gc_bench::{AppThread, BenchConfig, Benchmark, CollectorKind, Result};


fn run() -> Result<()> {
    let kind = CollectorKind::from_build();
    AppThread::attach(kind)?;

    println!("=== Matrix GC Benchmark ===");
    println!("Comparing GC performance with heavy heap allocation");
    println!();

    println!("Collector: {}", kind);
    println!("Collector Threads: {}", kind.threads());
    println!("NumCPU: {}", num_cpus::get());
    println!();

    let mut bench = Benchmark::new(BenchConfig::default(), rand::thread_rng());

    let config = bench.config();
    println!("Configuration:");
    println!("  Matrix Size: {}x{}", config.matrix_size, config.matrix_size);
    println!("  Iterations: {} (+ {} warmup)", config.iterations, config.warmup_iterations);
    println!();

    println!("Running warmup...");
    bench.warmup();

    println!("Starting benchmark...");
    let report = bench.measure()?;

    println!();
    print!("{}", report);
    println!();
    println!("Benchmark complete!");

    AppThread::detach();
    Ok(())
}


fn main() {
    // stdout carries the report, logging goes to stderr
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
