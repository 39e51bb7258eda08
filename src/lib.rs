// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![warn(unused_imports)]
#![warn(dead_code)]

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Fitbit Uploader Deploy
//!
//! Push-to-server deployment for the Fitbit uploader service.
//!
//! ## Overview
//!
//! One invocation takes the local project tree to a running systemd service
//! on a remote Linux host:
//!
//! 1. **Preflight**: validate settings and preview the sync locally
//! 2. **Directory**: `mkdir -p` the application directory
//! 3. **Sync**: `rsync` the tree, keeping secrets and local artifacts out
//! 4. **Secrets**: list manually provisioned files missing on the host
//! 5. **Dependencies**: create the virtual environment and `pip install`
//! 6. **Restart**: `systemctl restart` the unit
//! 7. **Status and logs**: show `systemctl status` and recent `journalctl`
//!
//! Steps 1, 2, 3, 5 and 6 abort the deployment on failure. The secrets check
//! and status query only warn, and the log tail is informational.
//!
//! ## Modules
//!
//! - [`config`]: settings resolution, validation and sync exclusions
//! - [`remote`]: `ssh`/`rsync` invocations and the process runner
//! - [`deploy`]: step plan, orchestrator and report
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # deploy.yaml (optional)
//! target:
//!   user: deploy
//!   remote_dir: /srv/fitbit-uploader
//! sync:
//!   extra_excludes:
//!     - logs/
//! log_lines: 50
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod remote;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployConfig, DeploySettings};
pub use deploy::{DeploymentPlan, DeploymentReport, Orchestrator};
pub use error::{DeployError, Result};
pub use remote::{CommandRunner, ProcessRunner};
