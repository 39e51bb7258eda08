//! Child-process command runner.
//!
//! Output is streamed line by line to the operator's terminal while it is
//! captured for the deployment report.

use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RemoteError, Result};

use super::invocation::Invocation;
use super::runner::{CommandOutput, CommandRunner};

/// How long output readers may run once the child has been killed.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runs invocations as local child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    /// Forward captured lines to this process's stdout/stderr.
    echo: bool,
}

/// Which standard stream a reader is attached to.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl ProcessRunner {
    /// Creates a runner that captures output silently.
    #[must_use]
    pub const fn new() -> Self {
        Self { echo: false }
    }

    /// Sets whether output is echoed to the terminal as it arrives.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutput> {
        debug!("Running: {invocation}");
        let start = Instant::now();

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::spawn(&invocation.program, e.to_string()))?;

        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stdout_task = tokio::spawn(collect_lines(
            child.stdout.take(),
            Stream::Stdout,
            self.echo,
            Arc::clone(&stdout_buf),
        ));
        let stderr_task = tokio::spawn(collect_lines(
            child.stderr.take(),
            Stream::Stderr,
            self.echo,
            Arc::clone(&stderr_buf),
        ));

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let (exit_code, timed_out) = match waited {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!("{} timed out after {:?}, killing it", invocation.program, timeout);
                let _ = child.kill().await;
                (None, true)
            }
        };

        // Descendants may still hold the pipes open after the child is gone.
        let drain_for = if timed_out {
            OUTPUT_DRAIN_GRACE
        } else {
            timeout.saturating_sub(start.elapsed()).max(OUTPUT_DRAIN_GRACE)
        };
        let deadline = tokio::time::Instant::now() + drain_for;
        let stdout = drain(stdout_task, &stdout_buf, deadline).await;
        let stderr = drain(stderr_task, &stderr_buf, deadline).await;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
            duration: start.elapsed(),
        })
    }
}

/// Reads a pipe to EOF, optionally echoing each line.
///
/// Lines are split on raw `\n` bytes and decoded lossily; invalid UTF-8
/// never ends the read early.
async fn collect_lines<R>(reader: Option<R>, stream: Stream, echo: bool, sink: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                if echo {
                    match stream {
                        Stream::Stdout => {
                            let _ = writeln!(std::io::stdout().lock(), "{line}");
                        }
                        Stream::Stderr => eprintln!("{line}"),
                    }
                }
                if let Ok(mut collected) = sink.lock() {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading {stream:?}: {e}");
                break;
            }
        }
    }
}

/// Waits for a reader task until `deadline`, then detaches it and returns
/// whatever it captured.
async fn drain(mut task: JoinHandle<()>, buffer: &Mutex<String>, deadline: tokio::time::Instant) -> String {
    if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
        debug!("Output pipe still open after the process ended, detaching reader");
        task.abort();
    }
    buffer
        .lock()
        .map(|mut collected| std::mem::take(&mut *collected))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("sh").arg("-c").arg("echo hello; echo oops >&2; exit 3");

        let output = runner.run(&inv, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_kept_and_drained() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("sh")
            .arg("-c")
            .arg("printf 'caf\\351.txt\\n'; sleep 0.3; echo sent; exit 0");

        let output = runner.run(&inv, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "caf\u{fffd}.txt\nsent\n");
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_timeout_not_extended_by_descendant_holding_pipes() {
        let runner = ProcessRunner::new();
        // The shell is killed; its `sleep` child keeps stdout and stderr open.
        let inv = Invocation::new("sh").arg("-c").arg("sleep 4; true");

        let output = runner.run(&inv, Duration::from_millis(200)).await.unwrap();

        assert!(output.timed_out);
        assert!(output.duration < Duration::from_secs(3), "took {:?}", output.duration);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("sleep").arg("5");

        let output = runner.run(&inv, Duration::from_millis(100)).await.unwrap();

        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert!(output.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("nonexistent_command_12345");

        let result = runner.run(&inv, Duration::from_secs(5)).await;

        assert!(matches!(
            result,
            Err(DeployError::Remote(RemoteError::SpawnFailed { .. }))
        ));
    }
}
