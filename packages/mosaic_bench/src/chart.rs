// Speedup charts: one line chart per (stage, threaded mode) pair, with one line per test size.

mod font;
mod png;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

pub use png::*;
use tracing::{error, info};

use crate::{Result, RunMode, Speedup, SpeedupTable, TestMatrix, ThreadCount};

/// One line of a chart: the speedup of one test size at every thread count of the chart.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    label: String,
    points: Vec<Option<f64>>,
}

impl Series {
    /// Creates a series. `points` holds one entry per thread count of the chart, `None` where
    /// the speedup is undefined.
    #[must_use]
    pub fn new(label: impl Into<String>, points: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    /// Legend label of the series.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The speedups, aligned with the thread counts of the chart.
    #[must_use]
    pub fn points(&self) -> &[Option<f64>] {
        &self.points
    }
}

/// Speedup versus thread count of one stage in one threaded mode.
///
/// Thread counts are categories on the x axis, in ascending order.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    mode: RunMode,
    stage: usize,
    thread_counts: Vec<ThreadCount>,
    series: Vec<Series>,
}

impl Chart {
    /// Creates a chart of the zero-based `stage` in `mode`.
    ///
    /// The thread counts are sorted into ascending order and the points of every series are
    /// reordered with them.
    #[must_use]
    pub fn new(
        mode: RunMode,
        stage: usize,
        thread_counts: Vec<ThreadCount>,
        series: Vec<Series>,
    ) -> Self {
        let mut order: Vec<usize> = (0..thread_counts.len()).collect();
        order.sort_by_key(|&i| thread_counts.get(i).copied());

        let reorder = |values: &[Option<f64>]| -> Vec<Option<f64>> {
            order
                .iter()
                .map(|&i| values.get(i).copied().flatten())
                .collect()
        };

        let series = series
            .into_iter()
            .map(|s| Series::new(s.label, reorder(&s.points)))
            .collect();

        let thread_counts = order
            .iter()
            .filter_map(|&i| thread_counts.get(i).copied())
            .collect();

        Self {
            mode,
            stage,
            thread_counts,
            series,
        }
    }

    /// The threaded mode the chart compares against the sequential baseline.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Zero-based stage index.
    #[must_use]
    pub const fn stage(&self) -> usize {
        self.stage
    }

    /// The x axis categories, ascending.
    #[must_use]
    pub fn thread_counts(&self) -> &[ThreadCount] {
        &self.thread_counts
    }

    /// One series per test size.
    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Human-readable chart title.
    #[must_use]
    pub fn title(&self) -> String {
        format!(
            "Speedup of part {} in {} mode",
            self.stage.saturating_add(1),
            self.mode.name().replace('_', " ")
        )
    }

    /// The file name the chart is saved under.
    #[must_use]
    pub fn file_name(&self) -> String {
        chart_file_name(self.mode, self.stage)
    }
}

/// File name of the chart for the zero-based `stage` in `mode`.
#[must_use]
pub fn chart_file_name(mode: RunMode, stage: usize) -> String {
    format!("speedup-{mode}-part{}.png", stage.saturating_add(1))
}

/// Draws charts into files.
///
/// This trait is automatically mocked by mockall in test builds, generating
/// `MockChartBackend`.
#[cfg_attr(test, mockall::automock)]
pub trait ChartBackend: Debug {
    /// Renders `chart` to `path`, replacing any existing file.
    fn render(&self, chart: &Chart, path: &Path) -> Result<()>;
}

/// The outcome of rendering one chart.
#[derive(Debug)]
#[non_exhaustive]
pub struct ChartOutcome {
    /// Where the chart was written to, or would have been.
    pub path: PathBuf,

    /// Whether rendering succeeded.
    pub result: Result<()>,
}

/// Lays out one chart per stage and threaded mode of the table, stage-major.
///
/// Every chart has one series per test size, in matrix order, and the matrix' thread counts in
/// ascending order on the x axis.
#[must_use]
pub fn build_charts(table: &SpeedupTable, matrix: &TestMatrix) -> Vec<Chart> {
    let thread_counts = matrix.sorted_thread_counts();
    let mut charts = Vec::new();

    for stage in 0..table.stage_count() {
        for mode in RunMode::THREADED {
            let series = matrix
                .sizes()
                .iter()
                .map(|size| {
                    let points = thread_counts
                        .iter()
                        .map(|&threads| {
                            table
                                .get(stage, mode, size.name(), threads)
                                .and_then(Speedup::ratio)
                        })
                        .collect();

                    Series::new(size.name(), points)
                })
                .collect();

            charts.push(Chart::new(mode, stage, thread_counts.clone(), series));
        }
    }

    charts
}

/// Renders every chart into `dir`, overwriting existing files.
///
/// Charts are independent: a chart that fails to render is reported in its outcome and does
/// not prevent the others from being rendered. `dir` is not created.
pub fn render_charts(
    charts: &[Chart],
    dir: &Path,
    backend: &impl ChartBackend,
) -> Vec<ChartOutcome> {
    charts
        .iter()
        .map(|chart| {
            let path = dir.join(chart.file_name());
            let result = backend.render(chart, &path);

            match &result {
                Ok(()) => info!(path = %path.display(), "chart saved"),
                Err(e) => error!(path = %path.display(), error = %e, "chart could not be rendered"),
            }

            ChartOutcome { path, result }
        })
        .collect()
}
