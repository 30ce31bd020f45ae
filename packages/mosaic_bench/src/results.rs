// Raw trial results, keyed by the matrix cell they were measured in.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, RunMode, ThreadCount};

/// Identifies one cell of the test matrix: a run mode, a problem size and, for threaded modes,
/// a thread count.
///
/// Sequential keys never carry a thread count and threaded keys always do. The same key type is
/// used in memory and in the result file, so no key conversion happens when results are loaded.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CellKey {
    mode: RunMode,
    size: String,
    threads: Option<ThreadCount>,
}

impl CellKey {
    /// Key of a sequential cell.
    #[must_use]
    pub fn sequential(size: impl Into<String>) -> Self {
        Self {
            mode: RunMode::Sequential,
            size: size.into(),
            threads: None,
        }
    }

    /// Key of a cell in `mode`. The thread count is discarded if `mode` is sequential.
    #[must_use]
    pub fn threaded(mode: RunMode, size: impl Into<String>, threads: ThreadCount) -> Self {
        Self {
            mode,
            size: size.into(),
            threads: mode.is_threaded().then_some(threads),
        }
    }

    /// The run mode of the cell.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// The name of the problem size of the cell.
    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }

    /// The thread count of the cell; `None` for sequential cells.
    #[must_use]
    pub const fn threads(&self) -> Option<ThreadCount> {
        self.threads
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mode, self.size)?;

        if let Some(threads) = self.threads {
            write!(f, "/{threads}")?;
        }

        Ok(())
    }
}

/// The timings reported by one trial, one value per measured pipeline stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialResult(Vec<f64>);

impl TrialResult {
    /// Wraps the stage timings of one trial.
    #[must_use]
    pub const fn new(stages: Vec<f64>) -> Self {
        Self(stages)
    }

    /// All stage timings, in stage order.
    #[must_use]
    pub fn stages(&self) -> &[f64] {
        &self.0
    }

    /// The timing of one stage.
    #[must_use]
    pub fn stage(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Number of measured stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f64>> for TrialResult {
    fn from(stages: Vec<f64>) -> Self {
        Self::new(stages)
    }
}

/// Every trial of a benchmark run, grouped by matrix cell in repetition order.
///
/// All trials in a set report the same number of stages; [`push()`][Self::push] rejects
/// trials that do not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    cells: BTreeMap<CellKey, Vec<TrialResult>>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the result of one trial to its cell.
    pub fn push(&mut self, cell: CellKey, trial: TrialResult) -> Result<()> {
        match self.stage_count() {
            Some(expected) if expected != trial.stage_count() => {
                return Err(Error::StageCountMismatch {
                    cell,
                    expected,
                    actual: trial.stage_count(),
                });
            }
            _ => {}
        }

        self.cells.entry(cell).or_default().push(trial);
        Ok(())
    }

    /// The trials of one cell, in repetition order. Empty if the cell was never measured.
    #[must_use]
    pub fn trials(&self, cell: &CellKey) -> &[TrialResult] {
        self.cells.get(cell).map_or(&[], Vec::as_slice)
    }

    /// Number of stages reported by every trial, or `None` if the set is empty.
    #[must_use]
    pub fn stage_count(&self) -> Option<usize> {
        self.cells
            .values()
            .flatten()
            .next()
            .map(TrialResult::stage_count)
    }

    /// Iterates over all measured cells and their trials, ordered by cell key.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &[TrialResult])> {
        self.cells
            .iter()
            .map(|(cell, trials)| (cell, trials.as_slice()))
    }

    /// Number of measured cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell has been measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Converts the set into its persisted form.
    pub(crate) fn to_file(&self, fingerprint: &str) -> ResultFile {
        ResultFile {
            fingerprint: fingerprint.to_string(),
            cells: self
                .cells
                .iter()
                .map(|(cell, trials)| CellRecord {
                    mode: cell.mode,
                    size: cell.size.clone(),
                    threads: cell.threads,
                    trials: trials.clone(),
                })
                .collect(),
        }
    }

    /// Rebuilds a set from its persisted form, checking every invariant a built set upholds.
    pub(crate) fn from_file(file: ResultFile) -> Result<Self> {
        let mut set = Self::new();

        for record in file.cells {
            let cell = match (record.mode.is_threaded(), record.threads) {
                (false, None) => CellKey::sequential(record.size),
                (true, Some(threads)) => CellKey::threaded(record.mode, record.size, threads),
                (false, Some(threads)) => {
                    return Err(Error::SequentialCellWithThreads {
                        size: record.size,
                        threads,
                    });
                }
                (true, None) => {
                    return Err(Error::ThreadedCellWithoutThreads {
                        mode: record.mode,
                        size: record.size,
                    });
                }
            };

            match set.cells.entry(cell.clone()) {
                Entry::Occupied(_) => return Err(Error::DuplicateCell { cell }),
                Entry::Vacant(entry) => {
                    entry.insert(Vec::new());
                }
            }

            for trial in record.trials {
                set.push(cell.clone(), trial)?;
            }
        }

        Ok(set)
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cell, trials) in &self.cells {
            writeln!(f, "{cell}:")?;

            for trial in trials {
                writeln!(f, "    {:?}", trial.stages())?;
            }
        }

        Ok(())
    }
}

/// On-disk layout of a result set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ResultFile {
    /// Fingerprint of the test matrix that produced the results.
    pub(crate) fingerprint: String,

    #[serde(default)]
    cells: Vec<CellRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CellRecord {
    mode: RunMode,
    size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threads: Option<ThreadCount>,
    trials: Vec<TrialResult>,
}
