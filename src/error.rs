//! Error types for the deployment orchestrator.
//!
//! Errors fall into two families: configuration problems, which are detected
//! before any remote connection is attempted, and remote command failures,
//! which abort the remaining deployment sequence.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code used for configuration errors and generic failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code used when a remote command exceeds its time bound.
pub const EXIT_TIMEOUT: u8 = 124;

/// The main error type for the deployment orchestrator.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote command errors.
    #[error("Remote command error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No target host was given on the command line or in the environment.
    #[error("No target host given. Pass it as an argument or set {env_var}")]
    MissingHost {
        /// Environment variable consulted for the host.
        env_var: String,
    },

    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The local project root does not exist or is not a directory.
    #[error("Project root is not a directory: {path}")]
    ProjectRootMissing {
        /// Path that was expected to be the project root.
        path: PathBuf,
    },

    /// An exclusion pattern could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Matcher error message.
        message: String,
    },
}

/// Errors raised while running commands against the remote host.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote command ran and exited non-zero.
    #[error("{step} failed with exit code {exit_code}")]
    CommandFailed {
        /// Step that failed.
        step: String,
        /// Exit code of the local `ssh`/`rsync` process.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The process was terminated by a signal.
    #[error("{step} was terminated without an exit code")]
    Terminated {
        /// Step that was interrupted.
        step: String,
    },

    /// The command exceeded its time bound.
    #[error("{step} timed out after {timeout_secs}s")]
    Timeout {
        /// Step that timed out.
        step: String,
        /// Configured bound in seconds.
        timeout_secs: u64,
    },

    /// Dependency provisioning exceeded its time bound.
    #[error("Provisioning failed: dependency install did not finish within {timeout_secs}s")]
    ProvisioningTimeout {
        /// Configured bound in seconds.
        timeout_secs: u64,
    },

    /// The local program (`ssh`, `rsync`) could not be started.
    #[error("Failed to start '{program}': {message}")]
    SpawnFailed {
        /// Program that could not be spawned.
        program: String,
        /// Underlying error message.
        message: String,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the process exit code this error should terminate with.
    ///
    /// Remote failures propagate the failing command's exit code so that the
    /// orchestrator behaves like the shell commands it wraps.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Remote(RemoteError::CommandFailed { exit_code, .. }) => {
                u8::try_from(*exit_code)
                    .ok()
                    .filter(|code| *code != 0)
                    .unwrap_or(EXIT_FAILURE)
            }
            Self::Remote(RemoteError::Timeout { .. } | RemoteError::ProvisioningTimeout { .. }) => {
                EXIT_TIMEOUT
            }
            _ => EXIT_FAILURE,
        }
    }

    /// Returns true for errors detected before any remote contact.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error with an optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl RemoteError {
    /// Creates a command failure error.
    #[must_use]
    pub fn command_failed(step: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            step: step.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Creates a spawn failure error.
    #[must_use]
    pub fn spawn(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            message: message.into(),
        }
    }
}
