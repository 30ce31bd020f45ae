//! Integration tests for the benchmark pipeline.
//!
//! These tests drive the public API with a simulated subject whose stage timings scale
//! perfectly with the thread count, so every speedup is known in advance.

#![cfg(not(miri))]

use std::fs;
use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mosaic_bench::{
    CellKey, Chart, ChartBackend, Error, HarnessConfig, Invocation, PngChartBackend, Result,
    ResultSource, ResultStore, RunMode, Speedup, Subject, TestMatrix, TestSize, ThreadCount,
    TrialResult, analyze, run_with,
};

/// Sequential duration of the first stage. The second stage does not scale.
const SEQUENTIAL_TIME: f64 = 12.0;
const FIXED_TIME: f64 = 1.5;

/// A subject that records every invocation and reports timings that scale linearly with the
/// thread count.
#[derive(Debug, Default)]
struct SimulatedSubject {
    invocations: Mutex<Vec<Invocation>>,
}

impl SimulatedSubject {
    fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

impl Subject for SimulatedSubject {
    fn run(&self, invocation: &Invocation) -> Result<TrialResult> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let threads = invocation.threads.map_or(1, NonZero::get);

        Ok(TrialResult::new(vec![
            SEQUENTIAL_TIME / f64::from(threads),
            FIXED_TIME,
        ]))
    }
}

/// A subject that always fails to start.
#[derive(Debug)]
struct BrokenSubject;

impl Subject for BrokenSubject {
    fn run(&self, _invocation: &Invocation) -> Result<TrialResult> {
        Err(Error::NoTimings)
    }
}

/// A chart backend that records where it was asked to render without touching the disk.
#[derive(Debug, Default)]
struct RecordingBackend {
    paths: Mutex<Vec<PathBuf>>,
}

impl ChartBackend for RecordingBackend {
    fn render(&self, _chart: &Chart, path: &Path) -> Result<()> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

fn nz(value: u32) -> ThreadCount {
    NonZero::new(value).unwrap()
}

fn small_matrix(thread_counts: &[u32], repetitions: u32) -> TestMatrix {
    TestMatrix::new(
        vec![TestSize::new("small", "data/tiles/small", nz(50), nz(8))],
        thread_counts.iter().copied().map(nz).collect(),
        nz(repetitions),
    )
}

fn config_in(dir: &Path, matrix: TestMatrix) -> HarnessConfig {
    HarnessConfig::default()
        .with_results_path(dir.join("results.toml"))
        .with_chart_dir(dir)
        .with_matrix(matrix)
}

#[test]
fn cold_run_measures_every_cell_then_reuses_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2, 4], 2));
    let backend = RecordingBackend::default();

    let subject = SimulatedSubject::default();
    let first = run_with(&config, &subject, &backend).unwrap();

    // Sequential plus two threaded modes at two thread counts, twice each.
    assert_eq!(subject.call_count(), 10);
    assert_eq!(first.results.source, ResultSource::Built);
    assert!(config.results_path().exists());

    for (_, trials) in first.results.results.iter() {
        assert_eq!(trials.len(), 2);
        assert!(trials.iter().all(|trial| trial.stage_count() == 2));
    }

    let idle = SimulatedSubject::default();
    let second = run_with(&config, &idle, &backend).unwrap();

    assert_eq!(idle.call_count(), 0);
    assert_eq!(second.results.source, ResultSource::Cached);
    assert_eq!(second.results.results, first.results.results);
}

#[test]
fn speedups_match_the_simulated_scaling() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2, 4], 2));

    let report = run_with(
        &config,
        &SimulatedSubject::default(),
        &RecordingBackend::default(),
    )
    .unwrap();

    for mode in [RunMode::Parallel, RunMode::WorkStealing] {
        let at_two = report.speedups.get(0, mode, "small", nz(2)).unwrap();
        let at_four = report.speedups.get(0, mode, "small", nz(4)).unwrap();
        assert_eq!(at_two.ratio(), Some(2.0));
        assert_eq!(at_four.ratio(), Some(4.0));

        let fixed = report.speedups.get(1, mode, "small", nz(4)).unwrap();
        assert_eq!(fixed.ratio(), Some(1.0));
    }
}

#[test]
fn invocations_follow_mode_size_thread_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[4, 2], 1));
    let subject = SimulatedSubject::default();

    run_with(&config, &subject, &RecordingBackend::default()).unwrap();

    let order: Vec<(RunMode, Option<u32>)> = subject
        .invocations()
        .iter()
        .map(|invocation| (invocation.mode, invocation.threads.map(NonZero::get)))
        .collect();

    assert_eq!(
        order,
        [
            (RunMode::Sequential, None),
            (RunMode::Parallel, Some(4)),
            (RunMode::Parallel, Some(2)),
            (RunMode::WorkStealing, Some(4)),
            (RunMode::WorkStealing, Some(2)),
        ]
    );

    let first = subject.invocations().into_iter().next().unwrap();
    assert_eq!(first.tiles_dir, Path::new("data/tiles/small"));
    assert_eq!(first.tile_size, 50);
    assert_eq!(first.upscale, 8);
}

#[test]
fn changed_matrix_rebuilds_the_results() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::default();

    let config = config_in(dir.path(), small_matrix(&[2], 1));
    run_with(&config, &SimulatedSubject::default(), &backend).unwrap();

    let config = config_in(dir.path(), small_matrix(&[2, 8], 1));
    let subject = SimulatedSubject::default();
    let report = run_with(&config, &subject, &backend).unwrap();

    assert!(matches!(
        report.results.source,
        ResultSource::Rebuilt { .. }
    ));
    assert_eq!(subject.call_count(), 5);
    assert_eq!(
        report
            .results
            .results
            .trials(&CellKey::threaded(RunMode::Parallel, "small", nz(8)))
            .len(),
        1
    );
}

#[test]
fn failed_build_leaves_no_result_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2], 1));

    let error = run_with(&config, &BrokenSubject, &RecordingBackend::default()).unwrap_err();

    assert!(matches!(error, Error::NoTimings));
    assert!(!config.results_path().exists());
}

#[test]
fn corrupted_result_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2], 1));
    fs::write(config.results_path(), "fingerprint = [").unwrap();

    let subject = SimulatedSubject::default();
    let error = run_with(&config, &subject, &RecordingBackend::default()).unwrap_err();

    assert!(matches!(error, Error::DecodeResults { .. }));
    assert_eq!(subject.call_count(), 0);
}

#[test]
fn inconsistent_result_file_reports_the_offending_cell() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2], 1));
    fs::write(
        config.results_path(),
        r#"fingerprint = "abc"

[[cells]]
mode = "sequential"
size = "small"
trials = [[1.0]]

[[cells]]
mode = "sequential"
size = "small"
trials = [[2.0]]
"#,
    )
    .unwrap();

    let subject = SimulatedSubject::default();
    let error = run_with(&config, &subject, &RecordingBackend::default()).unwrap_err();

    let Error::CorruptResults { path, source } = error else {
        panic!("expected a corrupt results error, got {error:?}");
    };
    assert_eq!(path, config.results_path());
    assert!(matches!(*source, Error::DuplicateCell { .. }));
    assert_eq!(subject.call_count(), 0);
}

#[test]
fn charts_cover_every_stage_and_threaded_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2, 4], 1));
    let backend = RecordingBackend::default();

    let report = run_with(&config, &SimulatedSubject::default(), &backend).unwrap();

    assert!(report.all_charts_rendered());

    let names: Vec<String> = backend
        .paths
        .lock()
        .unwrap()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(
        names,
        [
            "speedup-parallel-part1.png",
            "speedup-work_stealing-part1.png",
            "speedup-parallel-part2.png",
            "speedup-work_stealing-part2.png",
        ]
    );
}

#[test]
fn png_charts_are_written_to_the_chart_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), small_matrix(&[2, 4], 1));

    let report = run_with(&config, &SimulatedSubject::default(), &PngChartBackend).unwrap();

    assert_eq!(report.charts.len(), 4);
    for outcome in &report.charts {
        assert!(outcome.result.is_ok(), "{:?}", outcome.result);

        let image = image::open(&outcome.path).unwrap();
        assert!(image.width() > 0);
    }
}

#[test]
fn missing_chart_directory_fails_charts_but_not_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config =
        config_in(dir.path(), small_matrix(&[2], 1)).with_chart_dir(dir.path().join("absent"));

    let report = run_with(&config, &SimulatedSubject::default(), &PngChartBackend).unwrap();

    assert!(!report.all_charts_rendered());
    assert!(report.charts.iter().all(|outcome| outcome.result.is_err()));
    assert!(config.results_path().exists());
}

#[test]
fn store_and_analysis_compose_without_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let matrix = small_matrix(&[2], 3);
    let store = ResultStore::new(dir.path().join("nested").join("results.toml"));

    let loaded = store
        .load_or_build(&matrix, &SimulatedSubject::default())
        .unwrap();
    let table = analyze(&loaded.results, &matrix);

    assert_eq!(loaded.source, ResultSource::Built);
    assert_eq!(table.stage_count(), 2);
    assert_eq!(
        table
            .get(0, RunMode::Parallel, "small", nz(2))
            .and_then(Speedup::ratio),
        Some(2.0)
    );

    let (fingerprint, reloaded) = store.load().unwrap().unwrap();
    assert_eq!(fingerprint, matrix.fingerprint().unwrap());
    assert_eq!(reloaded, loaded.results);
}

#[cfg(unix)]
mod external_program {
    use mosaic_bench::{ExternalProgram, run};

    use super::*;

    // Prints the first stage as 12 divided by the -T argument (1 when absent) and a constant
    // second stage.
    const SCRIPT: &str = r#"t=1
while [ $# -gt 0 ]; do
    if [ "$1" = "-T" ]; then t=$2; fi
    shift
done
echo "$((12 / t)) 1""#;

    fn shell_command() -> Vec<String> {
        ["sh", "-c", SCRIPT, "mosaic"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn full_run_against_a_shell_subject() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            config_in(dir.path(), small_matrix(&[2, 4], 1)).with_command(shell_command());

        let report = run(&config).unwrap();

        assert!(report.all_charts_rendered());
        assert_eq!(
            report
                .speedups
                .get(0, RunMode::WorkStealing, "small", nz(4))
                .and_then(Speedup::ratio),
            Some(4.0)
        );
        assert!(dir.path().join("speedup-parallel-part2.png").exists());
    }

    #[test]
    fn external_program_reports_parsed_stages() {
        let matrix = small_matrix(&[4], 1);
        let cell = CellKey::threaded(RunMode::Parallel, "small", nz(4));
        let invocation = Invocation::for_cell(&matrix, &cell).unwrap();

        let trial = ExternalProgram::new(shell_command()).run(&invocation).unwrap();

        assert_eq!(trial.stages(), [3.0, 1.0]);
    }
}
