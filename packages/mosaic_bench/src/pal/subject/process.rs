// Real subject implementation that starts the benchmarked program as a child process.

use std::io;
use std::process::Command;

use tracing::{debug, warn};

use crate::invoker::parse_timings;
use crate::pal::Subject;
use crate::{Error, Invocation, Result, TrialResult};

/// Runs the benchmarked program as a child process and parses the timings it prints.
///
/// The first element of the command is the program to start, the rest are arguments placed
/// before the per-trial flags. For example, `["go", "run", "proj3/mosaic"]` builds and runs a Go
/// program from source on every trial.
///
/// The child runs to completion without a timeout. Its standard output is the only result
/// channel; standard error is logged at debug level. A non-zero exit status is logged but does
/// not reject the trial if the output still parses.
#[derive(Clone, Debug)]
pub struct ExternalProgram {
    command: Vec<String>,
}

impl ExternalProgram {
    /// Creates a subject that runs `command` followed by the trial flags.
    #[must_use]
    pub const fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// The command prefix, without the per-trial flags.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

impl Subject for ExternalProgram {
    fn run(&self, invocation: &Invocation) -> Result<TrialResult> {
        let Some((program, prefix_args)) = self.command.split_first() else {
            return Err(Error::LaunchSubject {
                program: String::new(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "no benchmark subject command configured",
                ),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(prefix_args).args(invocation.to_args());

        debug!(command = ?cmd, "starting benchmark subject");

        let output = cmd.output().map_err(|source| Error::LaunchSubject {
            program: program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = stderr.trim(), "benchmark subject wrote to stderr");
        }

        if !output.status.success() {
            warn!(
                status = %output.status,
                "benchmark subject exited unsuccessfully, parsing its output anyway"
            );
        }

        parse_timings(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{CellKey, TestMatrix};

    fn sequential_invocation() -> Invocation {
        let matrix = TestMatrix::default();
        Invocation::for_cell(&matrix, &CellKey::sequential("small")).unwrap()
    }

    #[test]
    fn command_prefix_is_kept_verbatim() {
        let command = vec!["go".to_string(), "run".to_string(), "proj3/mosaic".to_string()];

        let subject = ExternalProgram::new(command.clone());

        assert_eq!(subject.command(), command.as_slice());
    }

    #[test]
    fn empty_command_is_launch_error() {
        let subject = ExternalProgram::new(Vec::new());

        let error = subject.run(&sequential_invocation()).unwrap_err();
        assert!(matches!(error, Error::LaunchSubject { .. }));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    fn missing_program_is_launch_error() {
        let subject = ExternalProgram::new(vec!["mosaic-bench-no-such-program".to_string()]);

        let error = subject.run(&sequential_invocation()).unwrap_err();
        assert!(matches!(error, Error::LaunchSubject { program, .. } if program == "mosaic-bench-no-such-program"));
    }

    // `sh -c <script> <name> <args...>` ignores the trial flags, which land in the positional
    // parameters of the script.
    #[cfg(unix)]
    fn shell(script: &str) -> ExternalProgram {
        ExternalProgram::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "subject".to_string(),
        ])
    }

    #[test]
    #[cfg(unix)]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    fn parses_stdout_of_child() {
        let subject = shell("echo '1.5 2.25'; echo ignored >&2");

        let trial = subject.run(&sequential_invocation()).unwrap();
        assert_eq!(trial.stages(), [1.5, 2.25]);
    }

    #[test]
    #[cfg(unix)]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    fn nonzero_exit_still_parses_output() {
        let subject = shell("echo 3; exit 1");

        let trial = subject.run(&sequential_invocation()).unwrap();
        assert_eq!(trial.stages(), [3.0]);
    }

    #[test]
    #[cfg(unix)]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    fn garbage_output_is_parse_error() {
        let subject = shell("echo ERROR: flag is required");

        let error = subject.run(&sequential_invocation()).unwrap_err();
        assert!(matches!(error, Error::InvalidTiming { token, .. } if token == "ERROR:"));
    }

    #[test]
    #[cfg(unix)]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    fn receives_trial_flags() {
        // Echo back the value following -M, which the subject uses to select the run mode.
        let subject = shell(
            r#"while [ "$#" -gt 0 ]; do if [ "$1" = "-M" ]; then [ "$2" = "s" ] && echo 1.0; fi; shift; done"#,
        );

        let trial = subject.run(&sequential_invocation()).unwrap();
        assert_eq!(trial.stages(), [1.0]);
    }
}
