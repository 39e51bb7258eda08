//! Output formatting for the deployment plan and report.
//!
//! Text output uses colored tables for a terminal; JSON output is meant for
//! scripts and CI logs.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;
use tabled::{Table, Tabled};

use crate::config::{HOST_ENV_VAR, SyncPreview};
use crate::deploy::{DeploymentPlan, DeploymentReport, StepOutcome, StepPolicy};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "On failure")]
    policy: String,
    #[tabled(rename = "Timeout")]
    timeout: String,
    #[tabled(rename = "Command")]
    command: String,
}

/// Step result row for table display.
#[derive(Tabled)]
struct StepResultRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Result")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
    #[tabled(rename = "Time")]
    duration: String,
}

#[derive(Serialize)]
struct PlanJson<'a> {
    plan: &'a DeploymentPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<&'a SyncPreview>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true for human-readable output.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan, preview: Option<&SyncPreview>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson { plan, preview }).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, preview),
        }
    }

    fn format_plan_text(plan: &DeploymentPlan, preview: Option<&SyncPreview>) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nDeployment plan for {}:{} ({})\n\n",
            plan.target.destination().bold(),
            plan.target.remote_dir,
            plan.target.service
        );

        let rows: Vec<PlanStepRow> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| PlanStepRow {
                index: i + 1,
                step: s.step.label().to_string(),
                policy: Self::format_policy(s.policy),
                timeout: format!("{}s", s.timeout_secs),
                command: Self::truncate(&s.invocation.to_string(), 70),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if let Some(preview) = preview {
            let _ = write!(
                output,
                "\nSync: {} file(s) to transfer, {} excluded\n",
                preview.transferred.len().to_string().green(),
                preview.excluded.len().to_string().yellow()
            );
            for path in &preview.excluded {
                let _ = writeln!(output, "   - {}", path.display().to_string().dimmed());
            }
        }

        let _ = write!(output, "\n{} Dry run: nothing was sent to the host.\n", "i".cyan());
        output
    }

    /// Formats the final deployment report.
    #[must_use]
    pub fn format_report(&self, report: &DeploymentReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &DeploymentReport) -> String {
        let mut output = String::new();

        let rows: Vec<StepResultRow> = report
            .steps
            .iter()
            .map(|r| StepResultRow {
                step: r.step.label().to_string(),
                outcome: Self::format_outcome(r.outcome),
                detail: r
                    .failure
                    .as_ref()
                    .map(|f| Self::truncate(&f.to_string(), 50))
                    .unwrap_or_default(),
                duration: if r.duration_ms > 0 {
                    format!("{:.1}s", Duration::from_millis(r.duration_ms).as_secs_f64())
                } else {
                    String::new()
                },
            })
            .collect();

        output.push('\n');
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if !report.warnings.is_empty() {
            let _ = write!(output, "\n{} Warnings:\n", "!".yellow().bold());
            for warning in &report.warnings {
                let _ = writeln!(output, "   - {warning}");
            }
        }

        if let Some(failed) = report.fatal_step() {
            let _ = write!(
                output,
                "\n{} Deployment to {} aborted at '{}'",
                "✗".red(),
                report.target.destination(),
                failed.step
            );
            if let Some(failure) = &failed.failure {
                let _ = write!(output, ": {failure}");
            }
            output.push('\n');
            let stderr = failed.stderr.trim();
            if !stderr.is_empty() {
                for line in stderr.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
                    let _ = writeln!(output, "   {}", line.dimmed());
                }
            }
        } else {
            let _ = write!(
                output,
                "\n{} Deployed to {}:{} ({} file(s) synced",
                "✓".green(),
                report.target.destination(),
                report.target.remote_dir,
                report.files_transferred
            );
            let tolerated = report.tolerated_count();
            if tolerated > 0 {
                let _ = write!(output, ", {} check(s) failed", tolerated.to_string().yellow());
            }
            output.push_str(")\n");
        }

        output
    }

    /// Returns the guidance printed when no target host was given.
    #[must_use]
    pub fn missing_host_guidance() -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Usage: fitbit-deploy <HOST> [OPTIONS]");
        let _ = writeln!(output);
        let _ = writeln!(output, "Pass the target host as the first argument or set {HOST_ENV_VAR}:");
        let _ = writeln!(output, "   fitbit-deploy 203.0.113.5");
        let _ = writeln!(output, "   {HOST_ENV_VAR}=203.0.113.5 fitbit-deploy");
        output
    }

    fn format_policy(policy: StepPolicy) -> String {
        match policy {
            StepPolicy::Fatal => "abort".red().to_string(),
            StepPolicy::Tolerated => "warn".yellow().to_string(),
            StepPolicy::ReportOnly => "report".dimmed().to_string(),
        }
    }

    fn format_outcome(outcome: StepOutcome) -> String {
        match outcome {
            StepOutcome::Succeeded => "ok".green().to_string(),
            StepOutcome::Tolerated => "tolerated".yellow().to_string(),
            StepOutcome::Failed => "failed".red().bold().to_string(),
            StepOutcome::Skipped => "skipped".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployConfig, DeploySettings, Overrides};
    use crate::deploy::{DeployStep, StepFailure, StepResult};
    use tempfile::TempDir;

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

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_plan_json_contains_commands() {
        let dir = TempDir::new().unwrap();
        let plan = DeploymentPlan::build(&settings(&dir));
        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan, None);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["plan"]["target"]["host"], "203.0.113.5");
        assert_eq!(value["plan"]["steps"][0]["step"], "ensure_directory");
        assert!(value.get("preview").is_none());
    }

    #[test]
    fn test_report_text_shows_failure() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let mut report = DeploymentReport::new(settings(&dir).target);
        report.record(StepResult {
            outcome: StepOutcome::Failed,
            failure: Some(StepFailure::Exit { code: 1 }),
            program: Some(String::from("ssh")),
            stderr: String::from("ERROR: No matching distribution found"),
            ..StepResult::skipped(DeployStep::ProvisionDependencies)
        });
        report.record(StepResult::skipped(DeployStep::RestartService));

        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report);
        assert!(text.contains("aborted at 'Install dependencies'"));
        assert!(text.contains("No matching distribution"));
        assert!(text.contains("skipped"));
    }

    #[test]
    fn test_report_json_has_id_and_steps() {
        let dir = TempDir::new().unwrap();
        let mut report = DeploymentReport::new(settings(&dir).target);
        report.record(StepResult::succeeded(DeployStep::Preflight));
        report.finish();

        let json = OutputFormatter::new(OutputFormat::Json).format_report(&report);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["id"].is_string());
        assert_eq!(value["steps"][0]["outcome"], "succeeded");
    }

    #[test]
    fn test_missing_host_guidance_names_env_var() {
        let text = OutputFormatter::missing_host_guidance();
        assert!(text.contains("DEPLOY_HOST"));
        assert!(text.starts_with("Usage:"));
    }
}
