// Subject trait abstraction for mocking in tests.

use std::fmt::Debug;

use crate::{Invocation, Result, TrialResult};

/// The program whose performance the harness measures.
///
/// An implementation executes one trial with the given parameters and returns the timings it
/// reports, one per measured pipeline stage, in stage order. Trials are executed one at a time
/// and an implementation is expected to block until its trial has completed.
///
/// This trait is automatically mocked by mockall in test builds, generating `MockSubject`.
#[cfg_attr(test, mockall::automock)]
pub trait Subject: Debug {
    /// Executes one trial and returns its stage timings.
    fn run(&self, invocation: &Invocation) -> Result<TrialResult>;
}
