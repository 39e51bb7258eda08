//! `fitbit-deploy` entrypoint.

use std::io::Write;
use std::process::ExitCode;

use fitbit_uploader_deploy::cli::{Cli, OutputFormat, OutputFormatter};
use fitbit_uploader_deploy::config::ConfigParser;
use fitbit_uploader_deploy::deploy::{DeploymentReport, Orchestrator};
use fitbit_uploader_deploy::error::{ConfigError, DeployError, Result};
use fitbit_uploader_deploy::remote::ProcessRunner;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Loaded before parsing so `.env` can supply DEPLOY_HOST and friends.
    let dotenv = ConfigParser::new().load_dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.output);
    match dotenv {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{e}"),
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if matches!(e, DeployError::Config(ConfigError::MissingHost { .. })) {
                eprintln!("\n{}", OutputFormatter::missing_host_guidance());
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initializes the logging system.
///
/// Logs always go to stderr so that JSON output on stdout stays parseable.
fn init_logging(verbose: bool, format: OutputFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        OutputFormat::Text => builder.init(),
        OutputFormat::Json => builder.json().init(),
    }
}

/// Main async entry point; returns the process exit code.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    let config = ConfigParser::new().load_or_default(cli.config.as_deref(), &cli.project_root)?;
    let settings = config.resolve(cli.overrides(), &cli.project_root)?;

    let runner = ProcessRunner::new().with_echo(formatter.is_text());
    let orchestrator = Orchestrator::new(&settings, &runner).with_progress(formatter.is_text());

    if cli.dry_run {
        let mut report = DeploymentReport::new(settings.target.clone());
        let preview = orchestrator.preflight(&mut report)?;
        emit(&formatter, &formatter.format_plan(&orchestrator.plan(), Some(&preview)));
        return Ok(ExitCode::SUCCESS);
    }

    let report = orchestrator.run().await?;
    emit(&formatter, &formatter.format_report(&report));

    Ok(report
        .failure()
        .map_or(ExitCode::SUCCESS, |e| ExitCode::from(DeployError::from(e).exit_code())))
}

/// Writes formatted output: text to stderr next to the logs, JSON to stdout.
fn emit(formatter: &OutputFormatter, output: &str) {
    if formatter.is_text() {
        eprintln!("{output}");
    } else {
        let _ = writeln!(std::io::stdout().lock(), "{output}");
    }
}
