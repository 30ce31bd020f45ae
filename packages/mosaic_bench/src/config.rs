// Harness configuration, loaded from an optional TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, TestMatrix};

/// Everything the harness needs to know to run: how to start the benchmark subject, where to
/// keep results and charts, and the test matrix.
///
/// Every field has a default, so an empty file (or no file at all) describes the standard
/// benchmark. Example:
///
/// ```toml
/// command = ["./mosaic"]
/// results_path = "benchmark/results.toml"
/// chart_dir = "benchmark/graph"
///
/// [matrix]
/// thread_counts = [2, 4, 8]
/// repetitions = 3
///
/// [[matrix.sizes]]
/// name = "small"
/// tiles_dir = "data/tiles/small"
/// tile_size = 50
/// upscale = 8
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    command: Vec<String>,
    results_path: PathBuf,
    chart_dir: PathBuf,
    matrix: TestMatrix,
}

impl HarnessConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| Error::DecodeConfig {
            path: path.to_path_buf(),
            source,
        })?;

        config.matrix.validate()?;

        Ok(config)
    }

    /// Replaces the command that starts the benchmark subject.
    #[must_use]
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Replaces the path of the result file.
    #[must_use]
    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = path.into();
        self
    }

    /// Replaces the directory charts are written to.
    #[must_use]
    pub fn with_chart_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chart_dir = dir.into();
        self
    }

    /// Replaces the test matrix.
    #[must_use]
    pub fn with_matrix(mut self, matrix: TestMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// The program (and leading arguments) that runs one trial.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Path of the result file.
    #[must_use]
    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Directory charts are written to. It must exist.
    #[must_use]
    pub fn chart_dir(&self) -> &Path {
        &self.chart_dir
    }

    /// The test matrix.
    #[must_use]
    pub fn matrix(&self) -> &TestMatrix {
        &self.matrix
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command: vec!["go".to_string(), "run".to_string(), "proj3/mosaic".to_string()],
            results_path: PathBuf::from("benchmark/results.toml"),
            chart_dir: PathBuf::from("benchmark/graph"),
            matrix: TestMatrix::default(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let (_dir, path) = write_config("");

        let config = HarnessConfig::load(&path).unwrap();

        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.command(), ["go", "run", "proj3/mosaic"]);
    }

    #[test]
    fn partial_matrix_keeps_other_defaults() {
        let (_dir, path) = write_config(
            r#"
command = ["./mosaic"]
chart_dir = "charts"

[matrix]
thread_counts = [2, 4]
repetitions = 3

[[matrix.sizes]]
name = "tiny"
tiles_dir = "tiles/tiny"
tile_size = 10
upscale = 2
"#,
        );

        let config = HarnessConfig::load(&path).unwrap();

        assert_eq!(config.command(), ["./mosaic"]);
        assert_eq!(config.chart_dir(), Path::new("charts"));
        assert_eq!(config.results_path(), Path::new("benchmark/results.toml"));
        assert_eq!(config.matrix().repetitions().get(), 3);
        assert_eq!(config.matrix().sizes().len(), 1);
        assert_eq!(config.matrix().size("tiny").unwrap().upscale().get(), 2);
        assert_eq!(config.matrix().intensity(), TestMatrix::default().intensity());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let (_dir, path) = write_config("threads = 4\n");

        let error = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(error, Error::DecodeConfig { .. }));
    }

    #[test]
    fn zero_thread_count_is_rejected() {
        let (_dir, path) = write_config("[matrix]\nthread_counts = [0, 2]\n");

        let error = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(error, Error::DecodeConfig { .. }));
    }

    #[test]
    fn invalid_matrix_is_rejected() {
        let (_dir, path) = write_config("[matrix]\nintensity = 2.0\n");

        let error = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(error, Error::InvalidMatrix { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();

        let error = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(error, Error::ReadConfig { .. }));
    }
}
