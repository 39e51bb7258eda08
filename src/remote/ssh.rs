//! SSH and rsync invocation builders for a deployment target.

use std::path::Path;
use std::time::Duration;

use crate::config::{DeployTarget, SyncExclusionSet};

use super::invocation::{Invocation, shell_quote};

/// Seconds between keepalive probes on an idle connection.
const SERVER_ALIVE_INTERVAL_SECS: u32 = 15;

/// Unanswered keepalive probes before ssh drops the connection.
const SERVER_ALIVE_COUNT_MAX: u32 = 3;

/// Builds key-authenticated `ssh` and `rsync` invocations for one target.
#[derive(Debug, Clone)]
pub struct SshTransport {
    target: DeployTarget,
    connect_timeout: Duration,
}

impl SshTransport {
    /// Creates a transport for the target.
    #[must_use]
    pub const fn new(target: DeployTarget, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
        }
    }

    /// Options shared by direct ssh calls and the rsync remote shell.
    fn ssh_options(&self) -> Vec<String> {
        let mut options = vec![
            String::from("-i"),
            self.target.ssh_key.display().to_string(),
            String::from("-o"),
            String::from("BatchMode=yes"),
            String::from("-o"),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            String::from("-o"),
            format!("ServerAliveInterval={SERVER_ALIVE_INTERVAL_SECS}"),
            String::from("-o"),
            format!("ServerAliveCountMax={SERVER_ALIVE_COUNT_MAX}"),
        ];
        if self.target.ssh_port != 22 {
            options.push(String::from("-p"));
            options.push(self.target.ssh_port.to_string());
        }
        options
    }

    /// Builds `ssh [options] user@host COMMAND`.
    ///
    /// `remote_command` is interpreted by the remote login shell.
    #[must_use]
    pub fn exec(&self, remote_command: &str) -> Invocation {
        Invocation::new("ssh")
            .args(self.ssh_options())
            .arg(self.target.destination())
            .arg(remote_command)
    }

    /// Builds the one-way sync of `local_root` into the remote directory.
    ///
    /// Archive mode preserves attributes and timestamps, `-z` compresses in
    /// transit. `--delete` is never passed, so extraneous remote files (the
    /// manually provisioned secrets among them) are left alone.
    #[must_use]
    pub fn sync(&self, local_root: &Path, exclusions: &SyncExclusionSet) -> Invocation {
        let remote_shell = std::iter::once(String::from("ssh"))
            .chain(self.ssh_options().iter().map(|o| shell_quote(o)))
            .collect::<Vec<_>>()
            .join(" ");

        let mut source = local_root.display().to_string();
        if !source.ends_with('/') {
            source.push('/');
        }

        Invocation::new("rsync")
            .arg("-avz")
            .args(exclusions.rsync_args())
            .arg("-e")
            .arg(remote_shell)
            .arg(source)
            .arg(self.target.rsync_destination())
    }
}
