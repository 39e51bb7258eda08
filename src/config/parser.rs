//! Configuration parser for the optional `deploy.yaml` file.
//!
//! The file is entirely optional: a deployment can run from command-line
//! arguments and environment variables alone. When present, its values sit
//! below the command line and environment in precedence.

use crate::error::{ConfigError, DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeployConfig;

/// Default configuration file names searched in the project root.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["deploy.yaml", "deploy.yml"];

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for locating `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or has unknown keys.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(DeployConfig::default());
        }

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::parse(format!("YAML parse error: {e}"), location)
        })?;

        Ok(config)
    }

    /// Loads the configuration from an explicit path, or from a default file
    /// in `project_root` when one exists, or falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing or any file is invalid.
    pub fn load_or_default(
        &self,
        explicit: Option<&Path>,
        project_root: &Path,
    ) -> Result<DeployConfig> {
        if let Some(path) = explicit {
            return self.load_file(path);
        }

        match find_config_file(project_root) {
            Some(path) => self.load_file(path),
            None => {
                debug!(
                    "No configuration file in {}, using defaults",
                    project_root.display()
                );
                Ok(DeployConfig::default())
            }
        }
    }

    /// Loads the .env file if present.
    ///
    /// Returns the path that was loaded, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<Option<PathBuf>> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if !env_path.exists() {
            debug!(".env file not found at: {}", env_path.display());
            return Ok(None);
        }

        dotenvy::from_path(&env_path).map_err(|e| {
            ConfigError::parse(
                format!("Failed to load .env file: {e}"),
                Some(env_path.display().to_string()),
            )
        })?;

        Ok(Some(env_path))
    }
}

/// Finds a default configuration file in the given directory.
#[must_use]
pub fn find_config_file(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let dir = dir.as_ref();
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
