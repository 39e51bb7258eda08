//! Fail-fast deployment orchestrator.
//!
//! Runs the plan one step at a time. A failed fatal step marks every later
//! step as skipped; tolerated and report-only steps never stop the sequence.
//! Nothing is retried and nothing is rolled back.

use colored::Colorize;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigValidator, DeploySettings, JSON_PATTERN, SyncPreview};
use crate::error::{DeployError, RemoteError, Result};
use crate::remote::CommandRunner;

use super::plan::{DeploymentPlan, PlannedStep};
use super::report::{DeploymentReport, StepResult};
use super::step::{DeployStep, StepFailure, StepOutcome, StepPolicy};

/// Runs a deployment against one target.
pub struct Orchestrator<'a, R: CommandRunner> {
    /// Resolved settings.
    settings: &'a DeploySettings,
    /// Runner for the remote invocations.
    runner: &'a R,
    /// Print a colored banner before each step.
    progress: bool,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    /// Creates a new orchestrator.
    ///
    /// Holding [`DeploySettings`] means the host precondition already passed.
    #[must_use]
    pub const fn new(settings: &'a DeploySettings, runner: &'a R) -> Self {
        Self {
            settings,
            runner,
            progress: false,
        }
    }

    /// Sets whether step banners are printed to stderr.
    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Builds the plan this orchestrator will run.
    #[must_use]
    pub fn plan(&self) -> DeploymentPlan {
        DeploymentPlan::build(self.settings)
    }

    /// Validates settings and previews the sync without contacting the host.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails.
    pub fn preflight(&self, report: &mut DeploymentReport) -> Result<SyncPreview> {
        let validation = ConfigValidator::new().validate(self.settings)?;
        for warning in validation.warnings {
            warn!("{warning}");
            report.warnings.push(warning);
        }

        let preview = SyncPreview::build(&self.settings.project_root, &self.settings.exclusions)?;
        for path in &preview.json_only {
            let warning = format!(
                "{} will not be synced: it is excluded only by the blanket '{JSON_PATTERN}' rule",
                path.display()
            );
            warn!("{warning}");
            report.warnings.push(warning);
        }

        report.files_transferred = preview.transferred.len();
        report.files_excluded = preview.excluded.len();
        info!(
            "Sync will transfer {} file(s), {} excluded",
            preview.transferred.len(),
            preview.excluded.len()
        );
        Ok(preview)
    }

    /// Runs the full deployment.
    ///
    /// Remote failures are recorded in the returned report rather than
    /// returned as errors; use [`DeploymentReport::failure`] to get the error
    /// the process should exit with.
    ///
    /// # Errors
    ///
    /// Returns an error only when preflight fails, before any remote contact.
    pub async fn run(&self) -> Result<DeploymentReport> {
        let mut report = DeploymentReport::new(self.settings.target.clone());
        info!(
            "Deploying {} to {}:{}",
            self.settings.project_root.display(),
            self.settings.target.destination(),
            self.settings.target.remote_dir
        );

        self.announce(DeployStep::Preflight);
        self.preflight(&mut report)?;
        report.record(StepResult::succeeded(DeployStep::Preflight));

        let plan = self.plan();
        let mut aborted = false;

        for planned in &plan.steps {
            if aborted {
                debug!("Skipping {}", planned.step);
                report.record(StepResult::skipped(planned.step));
                continue;
            }

            let result = self.execute(planned).await;
            if result.outcome == StepOutcome::Failed {
                aborted = true;
            }
            if planned.step == DeployStep::VerifySecrets && result.outcome == StepOutcome::Succeeded {
                for missing in result.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    let warning = format!(
                        "{missing} is missing in {}; copy it to the host manually",
                        self.settings.target.remote_dir
                    );
                    warn!("{warning}");
                    report.warnings.push(warning);
                }
            }
            report.record(result);
        }

        report.finish();
        if report.succeeded() {
            info!("Deployment {} finished", report.id);
        }
        Ok(report)
    }

    /// Runs one planned step and classifies the result by its policy.
    async fn execute(&self, planned: &PlannedStep) -> StepResult {
        self.announce(planned.step);
        debug!("{}: {}", planned.step, planned.invocation);

        let mut result = StepResult {
            program: Some(planned.invocation.program.clone()),
            ..StepResult::skipped(planned.step)
        };

        match self.runner.run(&planned.invocation, planned.timeout()).await {
            Ok(output) => {
                result.duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX);
                result.failure = if output.timed_out {
                    Some(StepFailure::Timeout {
                        secs: planned.timeout_secs,
                    })
                } else {
                    match output.exit_code {
                        Some(0) => None,
                        Some(code) => Some(StepFailure::Exit { code }),
                        None => Some(StepFailure::Signal),
                    }
                };
                result.stdout = output.stdout;
                result.stderr = output.stderr;
            }
            Err(e) => {
                let message = match e {
                    DeployError::Remote(RemoteError::SpawnFailed { message, .. }) => message,
                    other => other.to_string(),
                };
                result.failure = Some(StepFailure::Spawn { message });
            }
        }

        result.outcome = match (&result.failure, planned.policy) {
            (None, _) => StepOutcome::Succeeded,
            (Some(_), StepPolicy::Fatal) => StepOutcome::Failed,
            (Some(_), StepPolicy::Tolerated | StepPolicy::ReportOnly) => StepOutcome::Tolerated,
        };

        if let Some(failure) = &result.failure {
            match planned.policy {
                StepPolicy::Fatal => error!("{} failed ({failure}), aborting", planned.step),
                StepPolicy::Tolerated => warn!("{} failed ({failure}), continuing", planned.step),
                StepPolicy::ReportOnly => {
                    warn!("{} failed ({failure}); the service was already restarted", planned.step);
                }
            }
        }

        result
    }

    /// Marks the start of a step: a banner on a terminal, a log line otherwise.
    fn announce(&self, step: DeployStep) {
        if self.progress {
            eprintln!("{} {}", "==>".cyan().bold(), step.label().bold());
        } else {
            info!("{step}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployConfig, Overrides};
    use crate::remote::{CommandOutput, Invocation, MockCommandRunner};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every invocation; fails those whose remote command contains a
    /// scripted needle (or whose program equals it).
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Invocation>>,
        script: Vec<(&'static str, CommandOutput)>,
    }

    impl ScriptedRunner {
        fn failing(needle: &'static str, output: CommandOutput) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: vec![(needle, output)],
            }
        }

        fn commands(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|inv| {
                    if inv.program == "rsync" {
                        String::from("rsync")
                    } else {
                        inv.last_arg().unwrap_or_default().to_string()
                    }
                })
                .collect()
        }

        fn ran(&self, needle: &str) -> bool {
            self.commands().iter().any(|c| c.contains(needle))
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, invocation: &Invocation, _timeout: Duration) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            let command = invocation.last_arg().unwrap_or_default();
            for (needle, output) in &self.script {
                if invocation.program == *needle || command.contains(needle) {
                    return Ok(output.clone());
                }
            }
            Ok(CommandOutput::ok(""))
        }
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "requests==2.32.3\n").unwrap();
        std::fs::write(dir.path().join(".env"), "API_KEY=secret\n").unwrap();
        dir
    }

    fn settings(dir: &TempDir) -> DeploySettings {
        DeployConfig::default()
            .resolve(
                Overrides {
                    host: Some(String::from("203.0.113.5")),
                    ..Overrides::default()
                },
                dir.path(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_sequence_in_order() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::default();

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(report.succeeded());
        let commands = runner.commands();
        assert_eq!(commands.len(), 7);
        assert_eq!(commands[0], "mkdir -p /opt/fitbit-uploader");
        assert_eq!(commands[1], "rsync");
        assert!(commands[3].contains("pip install -r requirements.txt"));
        assert_eq!(commands[4], "systemctl restart fitbit-uploader");
        assert_eq!(commands[5], "systemctl status fitbit-uploader --no-pager");
        assert_eq!(commands[6], "journalctl -u fitbit-uploader -n 30 --no-pager");
        assert_eq!(report.files_transferred, 2);
    }

    #[tokio::test]
    async fn test_provisioning_failure_prevents_restart() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing("pip install", CommandOutput::failed(1, "No matching distribution"));

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(!report.succeeded());
        assert!(!runner.ran("systemctl restart"));
        assert!(!runner.ran("journalctl"));
        assert_eq!(
            report.outcome(DeployStep::ProvisionDependencies),
            Some(StepOutcome::Failed)
        );
        assert_eq!(report.outcome(DeployStep::RestartService), Some(StepOutcome::Skipped));
        assert_eq!(report.outcome(DeployStep::LogTail), Some(StepOutcome::Skipped));
        assert!(matches!(
            report.failure(),
            Some(RemoteError::CommandFailed { exit_code: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_status_failure_does_not_prevent_log_tail() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing("systemctl status", CommandOutput::failed(3, ""));

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(report.succeeded());
        assert!(runner.ran("journalctl -u fitbit-uploader"));
        assert_eq!(report.outcome(DeployStep::StatusReport), Some(StepOutcome::Tolerated));
        assert_eq!(report.outcome(DeployStep::LogTail), Some(StepOutcome::Succeeded));
        assert!(report.failure().is_none());
    }

    #[tokio::test]
    async fn test_log_tail_failure_is_report_only() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing("journalctl", CommandOutput::failed(1, "no journal"));

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.outcome(DeployStep::LogTail), Some(StepOutcome::Tolerated));
    }

    #[tokio::test]
    async fn test_sync_failure_aborts_before_provisioning() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing("rsync", CommandOutput::failed(23, "partial transfer"));

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(!runner.ran("pip install"));
        assert_eq!(runner.commands().len(), 2);
        assert_eq!(DeployError::from(report.failure().unwrap()).exit_code(), 23);
    }

    #[tokio::test]
    async fn test_provisioning_timeout_is_distinct_error() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing(
            "pip install",
            CommandOutput::timeout(Duration::from_secs(900)),
        );

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(!runner.ran("systemctl restart"));
        assert!(matches!(
            report.failure(),
            Some(RemoteError::ProvisioningTimeout { timeout_secs: 900 })
        ));
    }

    #[tokio::test]
    async fn test_rerun_against_provisioned_target_succeeds() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::default();
        let orchestrator = Orchestrator::new(&settings, &runner);

        let first = orchestrator.run().await.unwrap();
        let second = orchestrator.run().await.unwrap();

        assert!(first.succeeded());
        assert!(second.succeeded());
        let commands = runner.commands();
        assert_eq!(commands[..7], commands[7..]);
    }

    #[tokio::test]
    async fn test_missing_remote_secrets_are_warnings() {
        let dir = project();
        let settings = settings(&dir);
        let runner = ScriptedRunner::failing("for f in", CommandOutput::ok("tokens.json\n"));

        let report = Orchestrator::new(&settings, &runner).run().await.unwrap();

        assert!(report.succeeded());
        assert!(report.warnings.iter().any(|w| w.starts_with("tokens.json is missing")));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_fatal() {
        let dir = project();
        let settings = settings(&dir);
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .times(1)
            .returning(|_, _| Err(RemoteError::spawn("ssh", "No such file or directory").into()));

        let report = Orchestrator::new(&settings, &mock).run().await.unwrap();

        assert_eq!(report.outcome(DeployStep::EnsureDirectory), Some(StepOutcome::Failed));
        assert!(matches!(
            report.failure(),
            Some(RemoteError::SpawnFailed { ref message, .. }) if message == "No such file or directory"
        ));
    }

    #[tokio::test]
    async fn test_invalid_settings_fail_before_remote() {
        let dir = project();
        let mut settings = settings(&dir);
        settings.target.remote_dir = String::from("relative/dir");
        let mut mock = MockCommandRunner::new();
        mock.expect_run().never();

        let result = Orchestrator::new(&settings, &mock).run().await;

        assert!(matches!(result, Err(DeployError::Config(_))));
    }
}
