//! Remote-shell transport.
//!
//! This module builds the `ssh` and `rsync` invocations for a deployment
//! target and runs them as local child processes with time bounds.

mod invocation;
mod runner;
mod process;
mod ssh;

pub use invocation::{Invocation, shell_quote};
pub use runner::{CommandOutput, CommandRunner};
#[cfg(test)]
pub use runner::MockCommandRunner;
pub use process::ProcessRunner;
pub use ssh::SshTransport;
