//! Local program invocations.
//!
//! Every remote operation is a local `ssh` or `rsync` process. An
//! [`Invocation`] is the program plus its argument vector; it is never passed
//! through a local shell, so only the remote command string needs quoting.

use serde::Serialize;
use std::fmt;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Program to execute, looked up on `PATH`.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the last argument, which for ssh is the remote command.
    #[must_use]
    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quotes a string for a POSIX shell.
///
/// Strings made only of safe characters are returned unchanged.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | '=' | '+' | ',')
        });
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote_safe() {
        assert_eq!(shell_quote("/opt/fitbit-uploader"), "/opt/fitbit-uploader");
        assert_eq!(shell_quote("root@203.0.113.5"), "root@203.0.113.5");
        assert_eq!(shell_quote("--exclude=venv/"), "--exclude=venv/");
    }

    #[test]
    fn test_shell_quote_unsafe() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("*.json"), "'*.json'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_display() {
        let inv = Invocation::new("ssh")
            .arg("root@host")
            .arg("mkdir -p /opt/app");
        assert_eq!(inv.to_string(), "ssh root@host 'mkdir -p /opt/app'");
        assert_eq!(inv.last_arg(), Some("mkdir -p /opt/app"));
    }
}
