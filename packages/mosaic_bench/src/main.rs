#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the mosaic benchmark harness.
//!
//! This module is excluded from mutation testing because it only wires command line arguments
//! and logging to the library, which requires spawning the real benchmark subject to observe.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use mosaic_bench::{HarnessConfig, ResultSource, run};
use tracing_subscriber::EnvFilter;

/// Benchmarks an image mosaic generator across run modes, problem sizes and thread counts,
/// then charts its speedup over sequential execution.
#[derive(FromArgs)]
struct Args {
    /// path to a TOML configuration file (defaults apply when omitted)
    #[argh(option)]
    config: Option<PathBuf>,

    /// path of the result file, overriding the configuration
    #[argh(option)]
    results: Option<PathBuf>,

    /// directory to write charts to, overriding the configuration
    #[argh(option)]
    chart_dir: Option<PathBuf>,

    /// log level used when RUST_LOG is not set (default: info)
    #[argh(option, default = "String::from(\"info\")")]
    log_level: String,
}

// Logging setup - the subscriber is process-global and cannot be observed from tests.
#[cfg_attr(test, mutants::skip)]
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> mosaic_bench::Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(results) = &args.results {
        config = config.with_results_path(results);
    }

    if let Some(chart_dir) = &args.chart_dir {
        config = config.with_chart_dir(chart_dir);
    }

    Ok(config)
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    setup_logging(&args.log_level);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let report = match run(&config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if report.results.source == ResultSource::Cached {
        println!(
            "Using cached results from {}",
            config.results_path().display()
        );
    } else {
        println!("Saved results to {}", config.results_path().display());
    }

    println!("Results data:");
    println!("{}", report.results.results);
    println!("Speedups data:");
    println!("{}", report.speedups);

    if report.all_charts_rendered() {
        ExitCode::SUCCESS
    } else {
        eprintln!("Error: some charts could not be rendered");
        ExitCode::FAILURE
    }
}
