//! CLI argument definitions.
//!
//! The tool has a single action, so there are no subcommands: the target host
//! is positional and everything else is an option.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Overrides;

/// Deploy the Fitbit uploader to a remote host over ssh.
///
/// Syncs the project tree (without secrets or local artifacts), installs
/// dependencies into a virtual environment, restarts the systemd unit and
/// shows its status and recent logs.
#[derive(Parser, Debug)]
#[command(name = "fitbit-deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target host (IP or name).
    #[arg(env = "DEPLOY_HOST")]
    pub host: Option<String>,

    /// Private key used for ssh and rsync.
    #[arg(short = 'i', long = "key", env = "SSH_KEY")]
    pub key: Option<String>,

    /// Remote login user.
    #[arg(short, long, env = "DEPLOY_USER")]
    pub user: Option<String>,

    /// Remote application directory.
    #[arg(long)]
    pub remote_dir: Option<String>,

    /// Systemd unit to restart.
    #[arg(long)]
    pub service: Option<String>,

    /// Local project tree to deploy.
    #[arg(short = 'C', long, default_value = ".")]
    pub project_root: PathBuf,

    /// Path to the configuration file.
    #[arg(short, long, env = "DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of journal lines to show after the restart.
    #[arg(short = 'n', long)]
    pub log_lines: Option<u32>,

    /// Print the plan without contacting the host.
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Collects the values that override the configuration file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            ssh_key: self.key.clone(),
            user: self.user.clone(),
            remote_dir: self.remote_dir.clone(),
            service: self.service.clone(),
            log_lines: self.log_lines,
        }
    }
}
