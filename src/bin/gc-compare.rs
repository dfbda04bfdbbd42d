//! Compare two saved `matrix-gc-bench` reports.


use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;
use log::debug;

use matrix_gc_bench::{Comparison, Metrics, Result};


#[derive(Parser, Debug)]
#[command(about = "Compare the output of two matrix-gc-bench runs")]
struct Args {
    /// Report of the baseline run
    #[arg(default_value = "benchmark_results/serial_gc.txt")]
    baseline: PathBuf,

    /// Report of the run being compared against the baseline
    #[arg(default_value = "benchmark_results/parallel_gc.txt")]
    candidate: PathBuf,
}


fn run(args: &Args) -> Result<()> {
    let baseline = Metrics::load(&args.baseline)?;
    let candidate = Metrics::load(&args.candidate)?;

    debug!("parsed {} baseline and {} candidate metrics", baseline.len(), candidate.len());

    print!("{}", Comparison::new(baseline, candidate));
    Ok(())
}


fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        eprintln!("Please run ./run_benchmark.sh first");
        process::exit(1);
    }
}
