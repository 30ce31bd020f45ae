use std::time::Instant;

use tracing::info;

use crate::invoker::run_trial;
use crate::pal::Subject;
use crate::{Result, ResultSet, TestMatrix};

/// Executes every trial of the matrix and collects the results.
///
/// Trials run one at a time, in the order mode, size, thread count, repetition. The first
/// failing trial aborts the whole run; no partial result set is returned.
pub fn run_matrix(matrix: &TestMatrix, subject: &impl Subject) -> Result<ResultSet> {
    matrix.validate()?;

    let cells = matrix.cells();
    let repetitions = matrix.repetitions().get();
    let started = Instant::now();

    info!(cells = cells.len(), repetitions, "running complete benchmark");

    let mut results = ResultSet::new();

    for cell in cells {
        for repetition in 1..=repetitions {
            info!(%cell, repetition, repetitions, "starting repetition");

            let trial = run_trial(subject, matrix, &cell)?;
            results.push(cell.clone(), trial)?;
        }
    }

    info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        "complete benchmark finished"
    );

    Ok(results)
}
