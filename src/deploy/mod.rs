//! Deployment sequencing.
//!
//! This module turns resolved settings into an ordered plan of remote steps
//! and runs it with a fail-fast policy: mandatory steps abort the sequence,
//! the status query and log tail never do.

mod step;
mod plan;
mod report;
mod orchestrator;

pub use step::{DeployStep, StepFailure, StepOutcome, StepPolicy};
pub use plan::{DeploymentPlan, PlannedStep};
pub use report::{DeploymentReport, StepResult};
pub use orchestrator::Orchestrator;
