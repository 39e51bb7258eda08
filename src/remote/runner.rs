//! Command runner abstraction.
//!
//! The orchestrator never spawns processes directly; it goes through a
//! [`CommandRunner`] so the step sequencing can be exercised without a
//! remote host.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

use super::invocation::Invocation;

/// Outcome of running one invocation to completion or to its time bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed or signalled.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the time bound was hit.
    pub timed_out: bool,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Creates a failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Creates an output for a process killed at its time bound.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self {
            timed_out: true,
            duration,
            ..Self::default()
        }
    }

    /// Returns true if the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs local program invocations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation, waiting at most `timeout`.
    ///
    /// A non-zero exit or a timeout is reported in the returned output; only
    /// a failure to start the program is an error.
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutput>;
}
