// Persistence of whole result sets and the decision whether a benchmark needs to run at all.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::pal::Subject;
use crate::results::ResultFile;
use crate::runner::run_matrix;
use crate::{Error, Result, ResultSet, TestMatrix};

/// Where a result set handed out by [`ResultStore::load_or_build()`] came from.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResultSource {
    /// Loaded from a result file produced by the same test matrix. No trial was executed.
    Cached,

    /// No result file existed, so every trial was executed and the results were saved.
    Built,

    /// A result file existed but was produced by a different test matrix, so every trial was
    /// executed again and the file was replaced.
    Rebuilt {
        /// Fingerprint found in the replaced file.
        stale_fingerprint: String,
    },
}

/// A result set together with its origin.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct LoadedResults {
    /// The results of every trial.
    pub results: ResultSet,

    /// Whether the results were loaded or freshly measured.
    pub source: ResultSource,
}

/// Persists whole result sets in a single TOML file.
///
/// The file is only ever written as a whole, after every trial of a benchmark run has
/// succeeded. It records the [fingerprint][TestMatrix::fingerprint] of the matrix that produced
/// it, which is what decides whether it can stand in for running the benchmark.
#[derive(Clone, Debug)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Creates a store backed by the file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the result file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the results of `matrix`, running the benchmark only if no usable result file
    /// exists.
    ///
    /// A result file with a matching fingerprint is returned as-is and `subject` is not
    /// invoked. Otherwise every trial of the matrix is executed and the results are saved
    /// before being returned. If any trial fails, the existing file (if any) is left untouched.
    pub fn load_or_build(
        &self,
        matrix: &TestMatrix,
        subject: &impl Subject,
    ) -> Result<LoadedResults> {
        let fingerprint = matrix.fingerprint()?;

        let source = match self.load()? {
            Some((stored, results)) if stored == fingerprint => {
                info!(path = %self.path.display(), "using cached benchmark results");

                return Ok(LoadedResults {
                    results,
                    source: ResultSource::Cached,
                });
            }
            Some((stored, _)) => {
                warn!(
                    path = %self.path.display(),
                    stored_fingerprint = %stored,
                    current_fingerprint = %fingerprint,
                    "cached benchmark results were produced by a different test matrix, rebuilding"
                );

                ResultSource::Rebuilt {
                    stale_fingerprint: stored,
                }
            }
            None => ResultSource::Built,
        };

        let results = run_matrix(matrix, subject)?;
        self.save(&fingerprint, &results)?;

        Ok(LoadedResults { results, source })
    }

    /// Reads the result file, returning the stored fingerprint and results, or `None` if the
    /// file does not exist.
    pub fn load(&self) -> Result<Option<(String, ResultSet)>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::ReadResults {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: ResultFile = toml::from_str(&contents).map_err(|source| Error::DecodeResults {
            path: self.path.clone(),
            source,
        })?;

        let fingerprint = file.fingerprint.clone();

        let results = ResultSet::from_file(file).map_err(|source| Error::CorruptResults {
            path: self.path.clone(),
            source: Box::new(source),
        })?;

        Ok(Some((fingerprint, results)))
    }

    /// Replaces the result file with `results`, tagged with `fingerprint`.
    ///
    /// The new contents are written to a temporary file next to the target and renamed over
    /// it, so readers never observe a partially written file. Missing parent directories are
    /// created.
    pub fn save(&self, fingerprint: &str, results: &ResultSet) -> Result<()> {
        let encoded = toml::to_string(&results.to_file(fingerprint))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let write_error = |source| Error::WriteResults {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(write_error)?;

        let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(encoded.as_bytes()).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(&self.path).map_err(|e| write_error(e.error))?;

        info!(path = %self.path.display(), cells = results.len(), "saved benchmark results");

        Ok(())
    }
}
