//! Validation of resolved deployment settings.
//!
//! Validation runs before any remote contact. Errors abort the deployment;
//! warnings are reported and the deployment proceeds.

use crate::error::{ConfigError, DeployError, Result};
use tracing::debug;

use super::spec::{DeploySettings, DeployTarget, RuntimeConfig, TimeoutConfig};

/// Validator for deployment settings.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates resolved settings.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or [`ConfigError::ProjectRootMissing`]
    /// when the local tree does not exist.
    pub fn validate(&self, settings: &DeploySettings) -> Result<ValidationResult> {
        if !settings.project_root.is_dir() {
            return Err(DeployError::Config(ConfigError::ProjectRootMissing {
                path: settings.project_root.clone(),
            }));
        }

        let mut result = ValidationResult::default();

        Self::validate_target(&settings.target, &mut result);
        Self::validate_runtime(settings, &settings.runtime, &mut result);
        Self::validate_timeouts(&settings.timeouts, &mut result);

        if settings.log_lines == 0 {
            result.errors.push(ValidationError {
                field: String::from("log_lines"),
                message: String::from("Log tail must request at least one line"),
            });
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(DeployError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates the remote target.
    fn validate_target(target: &DeployTarget, result: &mut ValidationResult) {
        if target.host.starts_with('-') || target.host.contains(char::is_whitespace) {
            result.errors.push(ValidationError {
                field: String::from("target.host"),
                message: format!("Host '{}' is not a valid host name", target.host),
            });
        }

        if target.host.contains('@') {
            result.errors.push(ValidationError {
                field: String::from("target.host"),
                message: String::from("Host must not contain a user; use --user instead"),
            });
        }

        if target.remote_user.is_empty()
            || target.remote_user.starts_with('-')
            || target.remote_user.contains(char::is_whitespace)
        {
            result.errors.push(ValidationError {
                field: String::from("target.user"),
                message: format!("Remote user '{}' is invalid", target.remote_user),
            });
        }

        if !target.remote_dir.starts_with('/') {
            result.errors.push(ValidationError {
                field: String::from("target.remote_dir"),
                message: format!("Remote directory must be absolute: {}", target.remote_dir),
            });
        } else if target.remote_dir.trim_end_matches('/').is_empty() {
            result.errors.push(ValidationError {
                field: String::from("target.remote_dir"),
                message: String::from("Remote directory cannot be the filesystem root"),
            });
        }

        if !is_valid_unit_name(&target.service) {
            result.errors.push(ValidationError {
                field: String::from("target.service"),
                message: format!("Service name '{}' is not a valid systemd unit", target.service),
            });
        }

        if target.ssh_port == 0 {
            result.errors.push(ValidationError {
                field: String::from("target.port"),
                message: String::from("SSH port cannot be 0"),
            });
        }

        if !target.ssh_key.is_file() {
            result.warnings.push(format!(
                "target.ssh_key: {} does not exist; ssh will fall back to its own identities",
                target.ssh_key.display()
            ));
        }
    }

    /// Validates runtime configuration.
    fn validate_runtime(
        settings: &DeploySettings,
        runtime: &RuntimeConfig,
        result: &mut ValidationResult,
    ) {
        if !is_safe_relative(&runtime.venv_dir) {
            result.errors.push(ValidationError {
                field: String::from("runtime.venv_dir"),
                message: format!(
                    "Virtual environment dir must be a plain relative path: {}",
                    runtime.venv_dir
                ),
            });
        }

        if !is_safe_relative(&runtime.requirements) {
            result.errors.push(ValidationError {
                field: String::from("runtime.requirements"),
                message: format!(
                    "Dependency manifest must be a plain relative path: {}",
                    runtime.requirements
                ),
            });
        } else if !settings.project_root.join(&runtime.requirements).is_file() {
            result.warnings.push(format!(
                "runtime.requirements: {} not found in {}; dependency install will fail",
                runtime.requirements,
                settings.project_root.display()
            ));
        }

        if runtime.python.is_empty() || runtime.python.contains(char::is_whitespace) {
            result.errors.push(ValidationError {
                field: String::from("runtime.python"),
                message: format!("Interpreter '{}' is invalid", runtime.python),
            });
        }
    }

    /// Validates time bounds.
    fn validate_timeouts(timeouts: &TimeoutConfig, result: &mut ValidationResult) {
        for (field, value) in [
            ("timeouts.connect_secs", timeouts.connect_secs),
            ("timeouts.sync_secs", timeouts.sync_secs),
            ("timeouts.provision_secs", timeouts.provision_secs),
            ("timeouts.command_secs", timeouts.command_secs),
        ] {
            if value == 0 {
                result.errors.push(ValidationError {
                    field: field.to_string(),
                    message: String::from("Timeout must be at least 1 second"),
                });
            }
        }
    }
}

/// Systemd unit names: ASCII alphanumerics plus `@._-`, not starting with `-`.
fn is_valid_unit_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
}

/// A non-empty relative path without parent components.
fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains(char::is_whitespace)
        && path.split('/').all(|part| part != "..")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployConfig, Overrides};
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> DeploySettings {
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
    fn test_valid_unit_name() {
        assert!(is_valid_unit_name("fitbit-uploader"));
        assert!(is_valid_unit_name("worker@1.service"));
        assert!(!is_valid_unit_name(""));
        assert!(!is_valid_unit_name("-x"));
        assert!(!is_valid_unit_name("a b"));
        assert!(!is_valid_unit_name("a;reboot"));
        assert!(!is_valid_unit_name("dev-sda1:backup"));
    }

    #[test]
    fn test_safe_relative() {
        assert!(is_safe_relative("venv"));
        assert!(is_safe_relative("deps/requirements.txt"));
        assert!(!is_safe_relative("/usr/bin"));
        assert!(!is_safe_relative("../venv"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn test_defaults_validate_with_warnings() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.target.ssh_key = dir.path().join("missing-key");

        let result = ConfigValidator::new().validate(&settings).unwrap();
        assert!(result.is_valid());
        // Missing key and missing requirements.txt.
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_manifest_present_no_warning() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "requests==2.32.3\n").unwrap();
        let key = dir.path().join("id_test");
        std::fs::write(&key, "key").unwrap();

        let mut settings = settings_in(&dir);
        settings.target.ssh_key = key;

        let result = ConfigValidator::new().validate(&settings).unwrap();
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_relative_remote_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.target.remote_dir = String::from("opt/app");

        let result = ConfigValidator::new().validate(&settings);
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn test_root_remote_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.target.remote_dir = String::from("/");
        assert!(ConfigValidator::new().validate(&settings).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.timeouts.provision_secs = 0;
        assert!(ConfigValidator::new().validate(&settings).is_err());
    }

    #[test]
    fn test_option_like_host_rejected() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.target.host = String::from("-oProxyCommand=x");
        assert!(ConfigValidator::new().validate(&settings).is_err());
    }

    #[test]
    fn test_missing_project_root() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir);
        settings.project_root = dir.path().join("absent");

        let result = ConfigValidator::new().validate(&settings);
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::ProjectRootMissing { .. }))
        ));
    }
}
