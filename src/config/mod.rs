//! Configuration module for the deployment orchestrator.
//!
//! This module handles all configuration-related functionality:
//! - Deserializing the optional `deploy.yaml` and applying overrides
//! - Validation of the resolved settings
//! - Previewing which local files the sync will transfer

mod spec;
mod parser;
mod validator;
mod exclusions;

pub use spec::{
    DEFAULT_REMOTE_DIR, DEFAULT_REMOTE_USER, DEFAULT_SERVICE, DEFAULT_SSH_KEY, DeployConfig,
    DeploySettings, DeployTarget, HOST_ENV_VAR, JSON_PATTERN, Overrides, RuntimeConfig,
    SSH_KEY_ENV_VAR, SyncConfig, SyncExclusionSet, TargetConfig, TimeoutConfig, expand_home,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use exclusions::{ExclusionMatcher, SyncPreview};
