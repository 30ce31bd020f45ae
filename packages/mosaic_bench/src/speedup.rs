// Derivation of speedup ratios from raw trial results.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::{CellKey, ResultSet, RunMode, TestMatrix, ThreadCount, TrialResult};

/// Why a speedup could not be computed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum UndefinedReason {
    /// The sequential cell of the size has no trials, so there is no baseline.
    NoBaselineTrials,

    /// The threaded cell has no trials.
    NoThreadedTrials,

    /// The threaded cell averaged to zero time, so the ratio would be a division by zero.
    ZeroThreadedTime,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoBaselineTrials => "no sequential trials",
            Self::NoThreadedTrials => "no threaded trials",
            Self::ZeroThreadedTime => "zero threaded time",
        })
    }
}

/// Ratio of the mean sequential time to the mean threaded time of one stage.
///
/// Values above 1.0 mean the threaded mode was faster. Values at or below 1.0 are legitimate
/// results that indicate threading overhead.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Speedup {
    /// A computed ratio.
    Ratio(f64),

    /// No ratio exists for the cell. Never equal to any computed ratio.
    Undefined(UndefinedReason),
}

impl Speedup {
    /// Derives the speedup from a baseline mean and a threaded mean, either of which may be
    /// missing.
    #[must_use]
    pub fn from_means(baseline: Option<f64>, threaded: Option<f64>) -> Self {
        match (baseline, threaded) {
            (None, _) => Self::Undefined(UndefinedReason::NoBaselineTrials),
            (Some(_), None) => Self::Undefined(UndefinedReason::NoThreadedTrials),
            (Some(_), Some(threaded)) if threaded == 0.0 => {
                Self::Undefined(UndefinedReason::ZeroThreadedTime)
            }
            (Some(baseline), Some(threaded)) => Self::Ratio(baseline / threaded),
        }
    }

    /// The ratio, if one exists.
    #[must_use]
    pub const fn ratio(self) -> Option<f64> {
        match self {
            Self::Ratio(ratio) => Some(ratio),
            Self::Undefined(_) => None,
        }
    }
}

impl fmt::Display for Speedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ratio(ratio) => write!(f, "{ratio:.4}"),
            Self::Undefined(reason) => write!(f, "undefined ({reason})"),
        }
    }
}

// Sizes are keyed by their position in the matrix so that iteration follows matrix order.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct SpeedupKey {
    stage: usize,
    mode: RunMode,
    size_index: usize,
    threads: ThreadCount,
}

/// Speedup of every stage, threaded mode, size and thread count.
///
/// Derived from a [`ResultSet`] on every execution and never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpeedupTable {
    stage_count: usize,
    sizes: Vec<String>,
    speedups: BTreeMap<SpeedupKey, Speedup>,
}

impl SpeedupTable {
    /// Number of stages the table covers.
    #[must_use]
    pub const fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// The speedup of one cell, or `None` if the table does not cover it.
    ///
    /// `stage` is zero-based.
    #[must_use]
    pub fn get(
        &self,
        stage: usize,
        mode: RunMode,
        size: &str,
        threads: ThreadCount,
    ) -> Option<Speedup> {
        let size_index = self.sizes.iter().position(|name| name == size)?;

        self.speedups
            .get(&SpeedupKey {
                stage,
                mode,
                size_index,
                threads,
            })
            .copied()
    }

    /// Whether the table covers no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speedups.is_empty()
    }

    /// Iterates over every cell as `(stage, mode, size, threads, speedup)`, ordered by stage,
    /// mode, size in matrix order and ascending thread count.
    pub fn iter(&self) -> impl Iterator<Item = (usize, RunMode, &str, ThreadCount, Speedup)> {
        self.speedups.iter().filter_map(|(key, &speedup)| {
            let size = self.sizes.get(key.size_index)?;
            Some((key.stage, key.mode, size.as_str(), key.threads, speedup))
        })
    }
}

impl fmt::Display for SpeedupTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current: Option<(usize, RunMode, &str)> = None;

        for (stage, mode, size, threads, speedup) in self.iter() {
            let group = (stage, mode, size);

            if current.is_none_or(|(s, _, _)| s != stage) {
                writeln!(f, "part {}:", stage.saturating_add(1))?;
            }

            if current.is_none_or(|(s, m, _)| (s, m) != (stage, mode)) {
                writeln!(f, "  {mode}:")?;
            }

            if current != Some(group) {
                writeln!(f, "    {size}:")?;
            }

            writeln!(f, "      {threads} threads: {speedup}")?;
            current = Some(group);
        }

        Ok(())
    }
}

/// Arithmetic mean of one stage over a set of trials, or `None` if there are no trials.
#[must_use]
pub fn mean_stage_time(trials: &[TrialResult], stage: usize) -> Option<f64> {
    let values: Vec<f64> = trials.iter().filter_map(|trial| trial.stage(stage)).collect();

    if values.is_empty() {
        return None;
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "repetition counts are far below the precision limit of f64"
    )]
    let count = values.len() as f64;

    Some(values.iter().sum::<f64>() / count)
}

/// Computes the speedup of every threaded cell of the matrix against the sequential cell of the
/// same size.
///
/// For each stage, the baseline is the mean sequential time of the stage and the threaded time
/// is the mean over the repetitions of the threaded cell. Cells without a meaningful ratio are
/// reported as [`Speedup::Undefined`] and logged as warnings. The result depends only on the
/// inputs, so identical inputs yield identical tables.
#[must_use]
pub fn analyze(results: &ResultSet, matrix: &TestMatrix) -> SpeedupTable {
    let Some(stage_count) = results.stage_count() else {
        warn!("no trial results to analyze");
        return SpeedupTable::default();
    };

    let mut speedups = BTreeMap::new();

    for stage in 0..stage_count {
        for (size_index, size) in matrix.sizes().iter().enumerate() {
            let baseline_cell = CellKey::sequential(size.name());
            let baseline = mean_stage_time(results.trials(&baseline_cell), stage);

            for mode in RunMode::THREADED {
                for &threads in matrix.thread_counts() {
                    let cell = CellKey::threaded(mode, size.name(), threads);
                    let threaded = mean_stage_time(results.trials(&cell), stage);
                    let speedup = Speedup::from_means(baseline, threaded);

                    if let Speedup::Undefined(reason) = speedup {
                        warn!(
                            part = stage.saturating_add(1),
                            %cell,
                            %reason,
                            "speedup is undefined"
                        );
                    }

                    speedups.insert(
                        SpeedupKey {
                            stage,
                            mode,
                            size_index,
                            threads,
                        },
                        speedup,
                    );
                }
            }
        }
    }

    SpeedupTable {
        stage_count,
        sizes: matrix
            .sizes()
            .iter()
            .map(|size| size.name().to_string())
            .collect(),
        speedups,
    }
}
