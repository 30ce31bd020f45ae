#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Benchmark harness that measures how much faster a parallel image mosaic generator gets as it
//! is given more threads.
//!
//! The harness drives an external mosaic program through a matrix of problem sizes, run modes
//! (sequential, parallel, work stealing) and thread counts, repeating every combination a fixed
//! number of times. The stage timings the program prints are persisted in a single result file,
//! so an expensive benchmark is only executed once per [`TestMatrix`]. From the raw timings the
//! harness derives the speedup of every threaded cell over the sequential baseline and draws one
//! chart per measured stage and threaded mode.
//!
//! # Pipeline
//!
//! 1. [`ResultStore::load_or_build()`] returns cached results if the result file was produced
//!    by the same matrix, otherwise it executes every trial via a [`Subject`] and saves them.
//! 1. [`analyze()`] averages every stage over the repetitions of each cell and divides the
//!    sequential mean by the threaded mean.
//! 1. [`build_charts()`] and [`render_charts()`] draw speedup versus thread count, one line per
//!    problem size.
//!
//! [`run()`] executes the whole pipeline against the real program; [`run_with()`] accepts any
//! [`Subject`] and [`ChartBackend`], which is how the harness is tested without the program.
//!
//! # Subject contract
//!
//! The benchmarked program receives the trial parameters as flags (see [`Invocation`]) and must
//! print the duration of every measured stage to standard output as whitespace-separated
//! floating-point numbers.

use tracing::info;

mod chart;
mod config;
mod error;
mod invoker;
mod matrix;
mod pal;
mod results;
mod runner;
mod speedup;
mod store;

pub use chart::*;
pub use config::*;
pub use error::*;
pub use invoker::*;
pub use matrix::*;
pub use pal::*;
pub use results::*;
pub use runner::*;
pub use speedup::*;
pub use store::*;

/// Everything a completed harness run produced.
#[derive(Debug)]
#[non_exhaustive]
pub struct RunReport {
    /// The raw trial results and whether they came from the result file.
    pub results: LoadedResults,

    /// The speedups derived from the results.
    pub speedups: SpeedupTable,

    /// The outcome of every chart, in rendering order.
    pub charts: Vec<ChartOutcome>,
}

impl RunReport {
    /// Whether every chart was rendered successfully.
    #[must_use]
    pub fn all_charts_rendered(&self) -> bool {
        self.charts.iter().all(|outcome| outcome.result.is_ok())
    }
}

/// Runs the complete benchmark pipeline against the configured external program, rendering
/// PNG charts.
pub fn run(config: &HarnessConfig) -> Result<RunReport> {
    let subject = ExternalProgram::new(config.command().to_vec());

    info!(command = ?subject.command(), "benchmark subject");

    run_with(config, &subject, &PngChartBackend)
}

/// Runs the complete benchmark pipeline with the given subject and chart backend.
///
/// Fails if the results can neither be loaded nor built. Chart failures do not fail the run;
/// they are reported in [`RunReport::charts`].
pub fn run_with(
    config: &HarnessConfig,
    subject: &impl Subject,
    backend: &impl ChartBackend,
) -> Result<RunReport> {
    let matrix = config.matrix();

    let store = ResultStore::new(config.results_path());
    let results = store.load_or_build(matrix, subject)?;

    let speedups = analyze(&results.results, matrix);

    let charts = build_charts(&speedups, matrix);
    let charts = render_charts(&charts, config.chart_dir(), backend);

    Ok(RunReport {
        results,
        speedups,
        charts,
    })
}
