// Execution of a single benchmark trial.
//
// This module turns a matrix cell into the parameters of one trial, hands them to the subject
// and defines how the subject's output is turned into stage timings.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::pal::Subject;
use crate::{CellKey, Error, Result, RunMode, TestMatrix, ThreadCount, TrialResult};

/// Parameters of one trial of the benchmark subject.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Invocation {
    /// The image the mosaic is generated from.
    pub input_image: PathBuf,

    /// Where the generated mosaic is written. Distinct per test size.
    pub output_image: PathBuf,

    /// Directory containing the mosaic tile images.
    pub tiles_dir: PathBuf,

    /// Edge length of a mosaic tile, in pixels.
    pub tile_size: u32,

    /// Integer factor the input image is upscaled by.
    pub upscale: u32,

    /// Mosaic intensity (0.0 - 1.0).
    pub intensity: f64,

    /// Tile colour blending factor (0.0 - 1.0).
    pub blending: f64,

    /// Execution strategy of the subject.
    pub mode: RunMode,

    /// Number of worker threads. Always `None` for sequential trials.
    pub threads: Option<ThreadCount>,
}

impl Invocation {
    /// Builds the parameters of a trial for one cell of the matrix.
    ///
    /// Fails if the cell refers to a test size the matrix does not define.
    pub fn for_cell(matrix: &TestMatrix, cell: &CellKey) -> Result<Self> {
        let size = matrix.size(cell.size()).ok_or_else(|| Error::InvalidMatrix {
            problem: format!("cell {cell} refers to an undefined test size"),
        })?;

        Ok(Self {
            input_image: matrix.input_image().to_path_buf(),
            output_image: matrix.output_image(size.name()),
            tiles_dir: size.tiles_dir().to_path_buf(),
            tile_size: size.tile_size().get(),
            upscale: size.upscale().get(),
            intensity: matrix.intensity(),
            blending: matrix.blending(),
            mode: cell.mode(),
            threads: cell.threads(),
        })
    }

    /// The command-line flags that pass these parameters to the subject.
    ///
    /// The thread count flag is only emitted for threaded modes.
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            self.input_image.clone().into(),
            "-o".into(),
            self.output_image.clone().into(),
            "-d".into(),
            self.tiles_dir.clone().into(),
            "-s".into(),
            self.tile_size.to_string().into(),
            "-U".into(),
            self.upscale.to_string().into(),
            "-I".into(),
            self.intensity.to_string().into(),
            "-B".into(),
            self.blending.to_string().into(),
            "-M".into(),
            self.mode.flag().into(),
        ];

        if let Some(threads) = self.threads {
            args.push("-T".into());
            args.push(threads.to_string().into());
        }

        args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.to_args();
        let mut first = true;

        for arg in &args {
            if !first {
                f.write_str(" ")?;
            }

            first = false;
            write!(f, "{}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Parses the standard output of the subject into stage timings.
///
/// The output must consist of whitespace-separated floating-point numbers, one per measured
/// stage. Any other token rejects the whole trial.
pub fn parse_timings(stdout: &str) -> Result<TrialResult> {
    let stages = stdout
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| Error::InvalidTiming {
                token: token.to_string(),
                output: stdout.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if stages.is_empty() {
        return Err(Error::NoTimings);
    }

    Ok(TrialResult::new(stages))
}

/// Executes one trial for a cell of the matrix.
pub fn run_trial(
    subject: &impl Subject,
    matrix: &TestMatrix,
    cell: &CellKey,
) -> Result<TrialResult> {
    let invocation = Invocation::for_cell(matrix, cell)?;

    info!(%cell, %invocation, "running trial");

    let trial = subject.run(&invocation)?;

    info!(%cell, stages = ?trial.stages(), "trial completed");

    Ok(trial)
}
