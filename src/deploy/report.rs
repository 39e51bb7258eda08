//! Deployment report: the typed result of every step of one run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::DeployTarget;
use crate::error::RemoteError;

use super::step::{DeployStep, StepFailure, StepOutcome, StepPolicy};

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Step that ran.
    pub step: DeployStep,
    /// Failure policy of the step.
    pub policy: StepPolicy,
    /// How the step ended.
    pub outcome: StepOutcome,
    /// Why the command failed, if it did.
    pub failure: Option<StepFailure>,
    /// Program that ran, if any.
    pub program: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Report of a whole deployment run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    /// Unique identifier of this run.
    pub id: Uuid,
    /// Host the deployment was started from.
    pub operator: String,
    /// Remote end of the deployment.
    pub target: DeployTarget,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Preflight warnings.
    pub warnings: Vec<String>,
    /// Files the sync will transfer.
    pub files_transferred: usize,
    /// Files kept local by the exclusion set.
    pub files_excluded: usize,
    /// Step results in execution order.
    pub steps: Vec<StepResult>,
}

impl StepResult {
    /// Creates a result for a step that never ran.
    #[must_use]
    pub const fn skipped(step: DeployStep) -> Self {
        Self {
            step,
            policy: step.policy(),
            outcome: StepOutcome::Skipped,
            failure: None,
            program: None,
            duration_ms: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Creates a successful result with no command output.
    #[must_use]
    pub const fn succeeded(step: DeployStep) -> Self {
        Self {
            step,
            policy: step.policy(),
            outcome: StepOutcome::Succeeded,
            failure: None,
            program: None,
            duration_ms: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Returns the error this step's fatal failure maps to.
    #[must_use]
    pub fn to_error(&self) -> Option<RemoteError> {
        let failure = self.failure.as_ref()?;
        Some(failure.to_remote_error(
            self.step,
            self.program.as_deref().unwrap_or_default(),
            &self.stderr,
        ))
    }
}

impl DeploymentReport {
    /// Starts a new report for the target.
    #[must_use]
    pub fn new(target: DeployTarget) -> Self {
        let operator = hostname::get()
            .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
        Self {
            id: Uuid::new_v4(),
            operator,
            target,
            started_at: Utc::now(),
            finished_at: None,
            warnings: Vec::new(),
            files_transferred: 0,
            files_excluded: 0,
            steps: Vec::new(),
        }
    }

    /// Records a step result.
    pub fn record(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    /// Marks the run as finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns the result for a step, if it was recorded.
    #[must_use]
    pub fn step(&self, step: DeployStep) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// Returns the outcome of a step, if it was recorded.
    #[must_use]
    pub fn outcome(&self, step: DeployStep) -> Option<StepOutcome> {
        self.step(step).map(|r| r.outcome)
    }

    /// Returns the step that aborted the sequence, if any.
    #[must_use]
    pub fn fatal_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.outcome == StepOutcome::Failed)
    }

    /// Returns the error the run should exit with, if a fatal step failed.
    #[must_use]
    pub fn failure(&self) -> Option<RemoteError> {
        self.fatal_step().and_then(StepResult::to_error)
    }

    /// Returns true if no fatal step failed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.fatal_step().is_none()
    }

    /// Returns the number of steps that were tolerated failures.
    #[must_use]
    pub fn tolerated_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Tolerated)
            .count()
    }

    /// Returns the run's duration in milliseconds, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
