// The benchmark dimensions: which problem sizes, run modes and thread counts are measured,
// how often each combination is repeated and the fixed parameters passed to every trial.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt::{self, Write as _};
use std::num::NonZero;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{CellKey, Error, Result};

/// Number of worker threads the benchmark subject is asked to use.
pub type ThreadCount = NonZero<u32>;

/// Execution strategy of the benchmark subject.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RunMode {
    /// Single-threaded reference implementation. Takes no thread count.
    Sequential,

    /// Work is split between a fixed number of threads up front.
    Parallel,

    /// Work is distributed between a fixed number of threads that steal from each other.
    WorkStealing,
}

impl RunMode {
    /// Every run mode, in the order the harness executes them.
    pub const ALL: [Self; 3] = [Self::Sequential, Self::Parallel, Self::WorkStealing];

    /// The run modes that are compared against the sequential baseline.
    pub const THREADED: [Self; 2] = [Self::Parallel, Self::WorkStealing];

    /// Stable name of the mode, as used in result files and chart file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::WorkStealing => "work_stealing",
        }
    }

    /// The value of the subject's run mode flag.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Sequential => "s",
            Self::Parallel => "p",
            Self::WorkStealing => "w",
        }
    }

    /// Whether the mode takes a thread count.
    #[must_use]
    pub const fn is_threaded(self) -> bool {
        !matches!(self, Self::Sequential)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One problem size of the benchmark and the subject parameters that produce it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSize {
    name: String,
    tiles_dir: PathBuf,
    tile_size: NonZero<u32>,
    upscale: NonZero<u32>,
}

impl TestSize {
    /// Creates a problem size that renders tiles from `tiles_dir`, each `tile_size` pixels wide,
    /// onto the input image upscaled by `upscale`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        tiles_dir: impl Into<PathBuf>,
        tile_size: NonZero<u32>,
        upscale: NonZero<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            tiles_dir: tiles_dir.into(),
            tile_size,
            upscale,
        }
    }

    /// Identifier of the size, e.g. `small`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory containing the mosaic tile images.
    #[must_use]
    pub fn tiles_dir(&self) -> &Path {
        &self.tiles_dir
    }

    /// Edge length of a mosaic tile, in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> NonZero<u32> {
        self.tile_size
    }

    /// Integer factor the input image is upscaled by before tiling.
    #[must_use]
    pub const fn upscale(&self) -> NonZero<u32> {
        self.upscale
    }
}

/// Static description of everything the harness measures.
///
/// The matrix is the single source of truth for the shape of a benchmark run. Its
/// [fingerprint][Self::fingerprint] is stored next to persisted results, so results produced by
/// a different matrix are never mistaken for results of this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestMatrix {
    input_image: PathBuf,
    output_prefix: PathBuf,
    intensity: f64,
    blending: f64,
    repetitions: NonZero<u32>,
    thread_counts: Vec<ThreadCount>,

    // Arrays of tables come last so the TOML encoding stays flat.
    sizes: Vec<TestSize>,
}

impl TestMatrix {
    /// Creates a matrix with the given dimensions and default subject parameters.
    #[must_use]
    pub fn new(
        sizes: Vec<TestSize>,
        thread_counts: Vec<ThreadCount>,
        repetitions: NonZero<u32>,
    ) -> Self {
        Self {
            sizes,
            thread_counts,
            repetitions,
            ..Self::default()
        }
    }

    /// Replaces the image every trial starts from.
    #[must_use]
    pub fn with_input_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_image = path.into();
        self
    }

    /// Replaces the prefix of the per-size output image paths.
    #[must_use]
    pub fn with_output_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    /// Replaces the mosaic intensity (0.0 - 1.0) passed to every trial.
    #[must_use]
    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    /// Replaces the tile colour blending factor (0.0 - 1.0) passed to every trial.
    #[must_use]
    pub fn with_blending(mut self, blending: f64) -> Self {
        self.blending = blending;
        self
    }

    /// The problem sizes, in execution order.
    #[must_use]
    pub fn sizes(&self) -> &[TestSize] {
        &self.sizes
    }

    /// Looks up a problem size by name.
    #[must_use]
    pub fn size(&self, name: &str) -> Option<&TestSize> {
        self.sizes.iter().find(|size| size.name == name)
    }

    /// The thread counts, in execution order.
    #[must_use]
    pub fn thread_counts(&self) -> &[ThreadCount] {
        &self.thread_counts
    }

    /// The thread counts in ascending order, without duplicates.
    #[must_use]
    pub fn sorted_thread_counts(&self) -> Vec<ThreadCount> {
        let mut sorted = self.thread_counts.clone();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
    }

    /// How many trials are executed for every cell of the matrix.
    #[must_use]
    pub const fn repetitions(&self) -> NonZero<u32> {
        self.repetitions
    }

    /// Mosaic intensity passed to every trial.
    #[must_use]
    pub const fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Tile colour blending factor passed to every trial.
    #[must_use]
    pub const fn blending(&self) -> f64 {
        self.blending
    }

    /// The image every trial starts from.
    #[must_use]
    pub fn input_image(&self) -> &Path {
        &self.input_image
    }

    /// The path a trial of the given size writes its mosaic to.
    ///
    /// Repetitions of the same size overwrite each other's output, which is fine because only
    /// the timings are retained.
    #[must_use]
    pub fn output_image(&self, size: &str) -> PathBuf {
        let mut path = OsString::from(self.output_prefix.as_os_str());
        path.push(format!("-{size}.png"));
        PathBuf::from(path)
    }

    /// Every cell of the matrix, in execution order: mode, then size, then thread count.
    #[must_use]
    pub fn cells(&self) -> Vec<CellKey> {
        let mut cells = Vec::new();

        for mode in RunMode::ALL {
            for size in &self.sizes {
                if mode.is_threaded() {
                    for &threads in &self.thread_counts {
                        cells.push(CellKey::threaded(mode, size.name(), threads));
                    }
                } else {
                    cells.push(CellKey::sequential(size.name()));
                }
            }
        }

        cells
    }

    /// Checks that the matrix describes a benchmark that can be executed and analyzed.
    pub fn validate(&self) -> Result<()> {
        if self.sizes.is_empty() {
            return Err(invalid_matrix("at least one test size is required"));
        }

        if self.thread_counts.is_empty() {
            return Err(invalid_matrix("at least one thread count is required"));
        }

        let mut names = HashSet::new();
        for size in &self.sizes {
            if size.name.is_empty() {
                return Err(invalid_matrix("test size names must not be empty"));
            }

            if !names.insert(size.name.as_str()) {
                return Err(invalid_matrix(format!(
                    "test size '{}' is defined more than once",
                    size.name
                )));
            }
        }

        let mut threads = HashSet::new();
        for &count in &self.thread_counts {
            if !threads.insert(count) {
                return Err(invalid_matrix(format!(
                    "thread count {count} is listed more than once"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(invalid_matrix(format!(
                "intensity must be from 0.0 to 1.0, got {}",
                self.intensity
            )));
        }

        if !(0.0..=1.0).contains(&self.blending) {
            return Err(invalid_matrix(format!(
                "blending must be from 0.0 to 1.0, got {}",
                self.blending
            )));
        }

        Ok(())
    }

    /// Hex-encoded SHA-256 digest of the canonical TOML encoding of the matrix.
    ///
    /// Two matrices have the same fingerprint exactly when they encode identically, which
    /// includes the order of sizes and thread counts.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical =
            toml::to_string(self).map_err(|source| Error::EncodeMatrix { source })?;
        let digest = Sha256::digest(canonical.as_bytes());

        let mut hex = String::with_capacity(digest.len().saturating_mul(2));
        for byte in digest {
            write!(hex, "{byte:02x}").expect("writing to a String is infallible");
        }

        Ok(hex)
    }
}

impl Default for TestMatrix {
    fn default() -> Self {
        Self {
            input_image: PathBuf::from("data/in/phoenix.png"),
            output_prefix: PathBuf::from("data/out/phoenix"),
            intensity: 0.7,
            blending: 0.7,
            repetitions: nz(5),
            thread_counts: [2, 4, 6, 8, 12].into_iter().map(nz).collect(),
            sizes: vec![
                TestSize::new("small", "data/tiles/small", nz(50), nz(8)),
                TestSize::new("medium", "data/tiles/medium", nz(200), nz(16)),
                TestSize::new("large", "data/tiles/large", nz(400), nz(32)),
            ],
        }
    }
}

fn nz(value: u32) -> NonZero<u32> {
    NonZero::new(value).expect("default matrix values are all non-zero")
}

fn invalid_matrix(problem: impl Into<String>) -> Error {
    Error::InvalidMatrix {
        problem: problem.into(),
    }
}
