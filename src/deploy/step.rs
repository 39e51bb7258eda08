//! Deployment steps and their failure policies.

use serde::Serialize;
use std::fmt;

use crate::error::RemoteError;

/// One step of the deployment sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStep {
    /// Local validation and sync preview; never touches the network.
    Preflight,
    /// Create the remote application directory.
    EnsureDirectory,
    /// Mirror the local tree into the remote directory.
    SyncFiles,
    /// List manually provisioned secret files missing on the remote host.
    VerifySecrets,
    /// Create the virtual environment and install dependencies.
    ProvisionDependencies,
    /// Restart the systemd unit.
    RestartService,
    /// Print the unit's status.
    StatusReport,
    /// Print the unit's recent journal.
    LogTail,
}

/// What a failure of a step does to the rest of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Abort the remaining steps.
    Fatal,
    /// Log a warning and continue.
    Tolerated,
    /// Report the failure; the deployment is already complete.
    ReportOnly,
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step succeeded.
    Succeeded,
    /// The step failed but its policy let the sequence continue.
    Tolerated,
    /// The step failed and aborted the sequence.
    Failed,
    /// The step never ran because an earlier step failed.
    Skipped,
}

/// Why a step's command failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// Non-zero exit.
    Exit {
        /// Exit code.
        code: i32,
    },
    /// Terminated without an exit code.
    Signal,
    /// Time bound exceeded.
    Timeout {
        /// Bound in seconds.
        secs: u64,
    },
    /// The local program could not be started.
    Spawn {
        /// Error message.
        message: String,
    },
}

impl DeployStep {
    /// Remote steps, in execution order.
    pub const REMOTE: [Self; 7] = [
        Self::EnsureDirectory,
        Self::SyncFiles,
        Self::VerifySecrets,
        Self::ProvisionDependencies,
        Self::RestartService,
        Self::StatusReport,
        Self::LogTail,
    ];

    /// Returns the failure policy of this step.
    #[must_use]
    pub const fn policy(self) -> StepPolicy {
        match self {
            Self::Preflight
            | Self::EnsureDirectory
            | Self::SyncFiles
            | Self::ProvisionDependencies
            | Self::RestartService => StepPolicy::Fatal,
            Self::VerifySecrets | Self::StatusReport => StepPolicy::Tolerated,
            Self::LogTail => StepPolicy::ReportOnly,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preflight => "Preflight checks",
            Self::EnsureDirectory => "Ensure remote directory",
            Self::SyncFiles => "Sync files",
            Self::VerifySecrets => "Check remote secrets",
            Self::ProvisionDependencies => "Install dependencies",
            Self::RestartService => "Restart service",
            Self::StatusReport => "Service status",
            Self::LogTail => "Recent logs",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for StepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Tolerated => write!(f, "tolerated"),
            Self::ReportOnly => write!(f, "report-only"),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "ok"),
            Self::Tolerated => write!(f, "tolerated"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit { code } => write!(f, "exit code {code}"),
            Self::Signal => write!(f, "terminated by signal"),
            Self::Timeout { secs } => write!(f, "timed out after {secs}s"),
            Self::Spawn { message } => write!(f, "could not start: {message}"),
        }
    }
}

impl StepFailure {
    /// Converts the failure of `step` into the error the process exits with.
    #[must_use]
    pub fn to_remote_error(&self, step: DeployStep, program: &str, stderr: &str) -> RemoteError {
        match self {
            Self::Exit { code } => RemoteError::command_failed(step.label(), *code, stderr),
            Self::Signal => RemoteError::Terminated {
                step: step.label().to_string(),
            },
            Self::Timeout { secs } if step == DeployStep::ProvisionDependencies => {
                RemoteError::ProvisioningTimeout {
                    timeout_secs: *secs,
                }
            }
            Self::Timeout { secs } => RemoteError::Timeout {
                step: step.label().to_string(),
                timeout_secs: *secs,
            },
            Self::Spawn { message } => RemoteError::spawn(program, message.clone()),
        }
    }
}
