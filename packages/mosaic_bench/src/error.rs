use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::{CellKey, RunMode, ThreadCount};

/// Errors that can occur while running the benchmark harness.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The benchmark subject could not be started or its output could not be collected.
    #[error("failed to run benchmark subject '{program}': {source}")]
    LaunchSubject {
        /// The program that was being started.
        program: String,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The benchmark subject printed something that is not a timing value.
    #[error("benchmark subject printed '{token}', which is not a timing value (full output: '{output}')")]
    InvalidTiming {
        /// The token that failed to parse as a floating-point number.
        token: String,

        /// The complete standard output of the subject.
        output: String,
    },

    /// The benchmark subject printed no timing values at all.
    #[error("benchmark subject printed no timing values")]
    NoTimings,

    /// A trial reported a different number of stages than the trials before it.
    #[error("trial for {cell} reported {actual} stages but other trials reported {expected}")]
    StageCountMismatch {
        /// The cell the offending trial belongs to.
        cell: CellKey,

        /// The stage count established by earlier trials.
        expected: usize,

        /// The stage count of the offending trial.
        actual: usize,
    },

    /// The harness configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    ReadConfig {
        /// Path of the configuration file.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The harness configuration file is not valid TOML for the expected schema.
    #[error("cannot decode configuration file {path}: {source}")]
    DecodeConfig {
        /// Path of the configuration file.
        path: PathBuf,

        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The test matrix describes a benchmark that cannot be executed.
    #[error("invalid test matrix: {problem}")]
    InvalidMatrix {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// The result file exists but could not be read.
    #[error("cannot read results file {path}: {source}")]
    ReadResults {
        /// Path of the result file.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The result file exists but is not valid TOML for the expected schema.
    #[error("cannot decode results file {path}: {source}")]
    DecodeResults {
        /// Path of the result file.
        path: PathBuf,

        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The test matrix could not be encoded as TOML to compute its fingerprint.
    #[error("cannot encode test matrix: {source}")]
    EncodeMatrix {
        /// The underlying TOML error.
        #[source]
        source: toml::ser::Error,
    },

    /// A persisted sequential cell carries a thread count.
    #[error("sequential cell for size '{size}' has a thread count ({threads})")]
    SequentialCellWithThreads {
        /// The test size of the cell.
        size: String,

        /// The unexpected thread count.
        threads: ThreadCount,
    },

    /// A persisted threaded cell has no thread count.
    #[error("{mode} cell for size '{size}' has no thread count")]
    ThreadedCellWithoutThreads {
        /// The threaded mode of the cell.
        mode: RunMode,

        /// The test size of the cell.
        size: String,
    },

    /// The same cell is persisted more than once.
    #[error("cell {cell} appears more than once")]
    DuplicateCell {
        /// The repeated cell.
        cell: CellKey,
    },

    /// The result file decoded successfully but describes an impossible result set.
    #[error("results file {path} is corrupt: {source}")]
    CorruptResults {
        /// Path of the result file.
        path: PathBuf,

        /// What is wrong with the contents.
        #[source]
        source: Box<Error>,
    },

    /// The result set could not be encoded as TOML.
    #[error("cannot encode results: {0}")]
    EncodeResults(#[from] toml::ser::Error),

    /// The result file could not be written.
    #[error("cannot write results file {path}: {source}")]
    WriteResults {
        /// Path of the result file.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A chart could not be rendered or saved.
    #[error("cannot render chart {path}: {source}")]
    RenderChart {
        /// Path the chart was being written to.
        path: PathBuf,

        /// The underlying image encoding or I/O error.
        #[source]
        source: image::ImageError,
    },
}

/// A specialized `Result` type for harness operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn invalid_timing_names_offending_token() {
        let error = Error::InvalidTiming {
            token: "oops".to_string(),
            output: "1.5 oops".to_string(),
        };

        let message = error.to_string();
        assert!(message.contains("'oops'"));
        assert!(message.contains("1.5 oops"));
    }

    #[test]
    fn matrix_encoding_failure_is_not_reported_as_results() {
        let error = Error::EncodeMatrix {
            source: <toml::ser::Error as serde::ser::Error>::custom("unsupported value"),
        };

        let message = error.to_string();
        assert!(message.contains("test matrix"));
        assert!(!message.contains("results"));
    }

    #[test]
    fn corrupt_results_keep_the_typed_cause() {
        let error = Error::CorruptResults {
            path: PathBuf::from("results.toml"),
            source: Box::new(Error::DuplicateCell {
                cell: CellKey::sequential("small"),
            }),
        };

        assert!(error.to_string().contains("sequential/small appears more than once"));
        assert!(std::error::Error::source(&error).is_some());

        let Error::CorruptResults { source, .. } = error else {
            unreachable!();
        };
        assert!(matches!(*source, Error::DuplicateCell { .. }));
    }

    #[test]
    fn launch_failure_exposes_source() {
        let error = Error::LaunchSubject {
            program: "missing".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };

        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("missing"));
    }
}
