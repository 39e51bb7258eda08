//! Configuration types for the deployment orchestrator.
//!
//! `DeployConfig` maps to the optional `deploy.yaml` file and carries every
//! tunable with its default. Once command-line and environment overrides are
//! applied it is resolved into `DeploySettings`, the fully specified input of
//! a single deployment run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Environment variable holding the default target host.
pub const HOST_ENV_VAR: &str = "DEPLOY_HOST";

/// Environment variable holding the private key path.
pub const SSH_KEY_ENV_VAR: &str = "SSH_KEY";

/// Default remote user.
pub const DEFAULT_REMOTE_USER: &str = "root";

/// Default remote application directory.
pub const DEFAULT_REMOTE_DIR: &str = "/opt/fitbit-uploader";

/// Default systemd unit name.
pub const DEFAULT_SERVICE: &str = "fitbit-uploader";

/// Default private key location.
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_ed25519";

/// Blanket JSON exclusion pattern.
pub const JSON_PATTERN: &str = "*.json";

/// The root structure of `deploy.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Remote host and service identity.
    pub target: TargetConfig,
    /// Remote runtime environment settings.
    pub runtime: RuntimeConfig,
    /// File synchronization settings.
    pub sync: SyncConfig,
    /// Time bounds for remote commands.
    pub timeouts: TimeoutConfig,
    /// Number of journal lines fetched after the restart.
    pub log_lines: u32,
    /// Files the remote service needs but the sync never transfers.
    pub secret_files: Vec<String>,
}

/// Remote host and service identity. Every field may be overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Target host name or address.
    pub host: Option<String>,
    /// Remote login user.
    pub user: Option<String>,
    /// Path to the private key.
    pub ssh_key: Option<String>,
    /// SSH port.
    pub port: Option<u16>,
    /// Remote application directory.
    pub remote_dir: Option<String>,
    /// Name of the systemd unit to restart.
    pub service: Option<String>,
}

/// Remote runtime environment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Virtual environment directory, relative to the remote directory.
    pub venv_dir: String,
    /// Interpreter used to create the virtual environment.
    pub python: String,
    /// Pinned dependency manifest, relative to the project root.
    pub requirements: String,
}

/// File synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Exclude every JSON file, not only the known secret ones.
    pub exclude_all_json: bool,
    /// Patterns appended after the default exclusion set.
    pub extra_excludes: Vec<String>,
}

/// Time bounds for remote commands, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// SSH connection timeout.
    pub connect_secs: u64,
    /// Bound on the file synchronization.
    pub sync_secs: u64,
    /// Bound on dependency provisioning.
    pub provision_secs: u64,
    /// Bound on every other remote command.
    pub command_secs: u64,
}

/// The remote end of a deployment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeployTarget {
    /// Target host name or address.
    pub host: String,
    /// Private key used for every remote-shell invocation.
    pub ssh_key: PathBuf,
    /// Remote login user.
    pub remote_user: String,
    /// SSH port.
    pub ssh_port: u16,
    /// Remote application directory.
    pub remote_dir: String,
    /// Name of the systemd unit.
    pub service: String,
}

/// Ordered set of rsync exclusion patterns.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SyncExclusionSet {
    patterns: Vec<String>,
}

/// Fully resolved input of a deployment run.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    /// Remote end of the deployment.
    pub target: DeployTarget,
    /// Local tree to synchronize.
    pub project_root: PathBuf,
    /// Remote runtime environment settings.
    pub runtime: RuntimeConfig,
    /// Patterns never transferred by the sync.
    pub exclusions: SyncExclusionSet,
    /// Time bounds for remote commands.
    pub timeouts: TimeoutConfig,
    /// Number of journal lines fetched after the restart.
    pub log_lines: u32,
    /// Files the remote service needs but the sync never transfers.
    pub secret_files: Vec<String>,
}

/// Values taken from the command line and environment.
///
/// These win over `deploy.yaml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Target host.
    pub host: Option<String>,
    /// Private key path.
    pub ssh_key: Option<String>,
    /// Remote user.
    pub user: Option<String>,
    /// Remote application directory.
    pub remote_dir: Option<String>,
    /// Systemd unit name.
    pub service: Option<String>,
    /// Journal line count.
    pub log_lines: Option<u32>,
}

// Default value functions

const fn default_log_lines() -> u32 {
    30
}

fn default_secret_files() -> Vec<String> {
    vec![
        String::from(".env"),
        String::from("tokens.json"),
        String::from("service_account.json"),
    ]
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            runtime: RuntimeConfig::default(),
            sync: SyncConfig::default(),
            timeouts: TimeoutConfig::default(),
            log_lines: default_log_lines(),
            secret_files: default_secret_files(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            venv_dir: String::from("venv"),
            python: String::from("python3"),
            requirements: String::from("requirements.txt"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exclude_all_json: true,
            extra_excludes: Vec::new(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 15,
            sync_secs: 300,
            provision_secs: 900,
            command_secs: 60,
        }
    }
}

impl DeployTarget {
    /// Returns the `user@host` destination used by ssh and rsync.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.remote_user, self.host)
    }

    /// Returns the rsync destination spec, `user@host:/remote/dir/`.
    #[must_use]
    pub fn rsync_destination(&self) -> String {
        format!(
            "{}:{}/",
            self.destination(),
            self.remote_dir.trim_end_matches('/')
        )
    }
}

impl SyncExclusionSet {
    /// Builds the default exclusion set.
    ///
    /// Order matters for rsync: earlier patterns are evaluated first.
    #[must_use]
    pub fn defaults(exclude_all_json: bool) -> Self {
        let mut set = Self::empty();
        for pattern in [
            "venv/",
            ".venv/",
            "__pycache__/",
            "*.pyc",
            ".env",
            "tokens.json",
            "service_account.json",
        ] {
            set.push(pattern);
        }
        if exclude_all_json {
            set.push(JSON_PATTERN);
        }
        for pattern in [".git/", "PLAN.md", "NOTES.md"] {
            set.push(pattern);
        }
        set
    }

    /// Creates an empty exclusion set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Appends a pattern unless it is already present or blank.
    pub fn push(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        let trimmed = pattern.trim();
        if trimmed.is_empty() || self.contains(trimmed) {
            return;
        }
        self.patterns.push(trimmed.to_string());
    }

    /// Returns the patterns in evaluation order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if the exact pattern is in the set.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p == pattern)
    }

    /// Returns the number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if no pattern is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns a copy of this set without the given pattern.
    #[must_use]
    pub fn without(&self, pattern: &str) -> Self {
        Self {
            patterns: self
                .patterns
                .iter()
                .filter(|p| p.as_str() != pattern)
                .cloned()
                .collect(),
        }
    }

    /// Renders the set as rsync `--exclude=PATTERN` arguments.
    #[must_use]
    pub fn rsync_args(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| format!("--exclude={p}"))
            .collect()
    }
}

impl DeployConfig {
    /// Applies overrides and resolves the configuration into settings.
    ///
    /// This is the precondition check of a deployment: it fails with
    /// [`ConfigError::MissingHost`] when no host is known, before anything
    /// touches the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is missing or blank.
    pub fn resolve(self, overrides: Overrides, project_root: &Path) -> Result<DeploySettings> {
        let host = overrides
            .host
            .or(self.target.host)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingHost {
                env_var: String::from(HOST_ENV_VAR),
            })?;

        let ssh_key = overrides
            .ssh_key
            .or(self.target.ssh_key)
            .unwrap_or_else(|| String::from(DEFAULT_SSH_KEY));

        let mut exclusions = SyncExclusionSet::defaults(self.sync.exclude_all_json);
        for pattern in self.sync.extra_excludes {
            exclusions.push(pattern);
        }

        let target = DeployTarget {
            host,
            ssh_key: expand_home(&ssh_key),
            remote_user: overrides
                .user
                .or(self.target.user)
                .unwrap_or_else(|| String::from(DEFAULT_REMOTE_USER)),
            ssh_port: self.target.port.unwrap_or(22),
            remote_dir: overrides
                .remote_dir
                .or(self.target.remote_dir)
                .unwrap_or_else(|| String::from(DEFAULT_REMOTE_DIR)),
            service: overrides
                .service
                .or(self.target.service)
                .unwrap_or_else(|| String::from(DEFAULT_SERVICE)),
        };

        Ok(DeploySettings {
            target,
            project_root: project_root.to_path_buf(),
            runtime: self.runtime,
            exclusions,
            timeouts: self.timeouts,
            log_lines: overrides.log_lines.unwrap_or(self.log_lines),
            secret_files: self.secret_files,
        })
    }
}

/// Expands a leading `~` against the current user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
