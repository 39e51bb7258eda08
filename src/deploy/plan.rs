//! Deployment plan construction.
//!
//! The plan is the ordered list of remote steps with the exact invocation
//! each one runs. Building it is pure; running it is the orchestrator's job.

use serde::Serialize;
use std::time::Duration;

use crate::config::{DeploySettings, DeployTarget};
use crate::remote::{Invocation, SshTransport, shell_quote};

use super::step::{DeployStep, StepPolicy};

/// One remote step with its command and time bound.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    /// Step being run.
    pub step: DeployStep,
    /// Failure policy of the step.
    pub policy: StepPolicy,
    /// Local invocation that performs it.
    pub invocation: Invocation,
    /// Time bound in seconds.
    pub timeout_secs: u64,
}

/// Ordered remote steps for one deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    /// Remote end of the deployment.
    pub target: DeployTarget,
    /// Steps in execution order.
    pub steps: Vec<PlannedStep>,
}

impl PlannedStep {
    fn new(step: DeployStep, invocation: Invocation, timeout_secs: u64) -> Self {
        Self {
            step,
            policy: step.policy(),
            invocation,
            timeout_secs,
        }
    }

    /// Returns the time bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DeploymentPlan {
    /// Builds the plan for the given settings.
    ///
    /// The secrets check is omitted when no secret files are configured.
    #[must_use]
    pub fn build(settings: &DeploySettings) -> Self {
        let target = &settings.target;
        let timeouts = settings.timeouts;
        let transport = SshTransport::new(
            target.clone(),
            Duration::from_secs(timeouts.connect_secs),
        );

        let dir = shell_quote(target.remote_dir.trim_end_matches('/'));
        let service = shell_quote(&target.service);
        let venv = shell_quote(&settings.runtime.venv_dir);

        let mut steps = Vec::with_capacity(DeployStep::REMOTE.len());

        steps.push(PlannedStep::new(
            DeployStep::EnsureDirectory,
            transport.exec(&format!("mkdir -p {dir}")),
            timeouts.command_secs,
        ));

        steps.push(PlannedStep::new(
            DeployStep::SyncFiles,
            transport.sync(&settings.project_root, &settings.exclusions),
            timeouts.sync_secs,
        ));

        if !settings.secret_files.is_empty() {
            let files = settings
                .secret_files
                .iter()
                .map(|f| shell_quote(f))
                .collect::<Vec<_>>()
                .join(" ");
            steps.push(PlannedStep::new(
                DeployStep::VerifySecrets,
                transport.exec(&format!(
                    "cd {dir} && for f in {files}; do [ -e \"$f\" ] || echo \"$f\"; done"
                )),
                timeouts.command_secs,
            ));
        }

        steps.push(PlannedStep::new(
            DeployStep::ProvisionDependencies,
            transport.exec(&format!(
                "cd {dir} && {{ [ -d {venv} ] || {python} -m venv {venv}; }} && {venv}/bin/pip install -r {requirements}",
                python = shell_quote(&settings.runtime.python),
                requirements = shell_quote(&settings.runtime.requirements),
            )),
            timeouts.provision_secs,
        ));

        steps.push(PlannedStep::new(
            DeployStep::RestartService,
            transport.exec(&format!("systemctl restart {service}")),
            timeouts.command_secs,
        ));

        steps.push(PlannedStep::new(
            DeployStep::StatusReport,
            transport.exec(&format!("systemctl status {service} --no-pager")),
            timeouts.command_secs,
        ));

        steps.push(PlannedStep::new(
            DeployStep::LogTail,
            transport.exec(&format!(
                "journalctl -u {service} -n {} --no-pager",
                settings.log_lines
            )),
            timeouts.command_secs,
        ));

        Self {
            target: target.clone(),
            steps,
        }
    }

    /// Returns the planned step for `step`, if it is part of the plan.
    #[must_use]
    pub fn get(&self, step: DeployStep) -> Option<&PlannedStep> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Returns the number of remote steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
