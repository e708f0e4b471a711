// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every tool in homeops is mostly a sequence of calls to other programs:
//! package managers, a compression tool, a transcoder, git, the IDE's own
//! CLI, etc. This module provides one way to describe such a call, and one
//! seam through which all of them are executed. Tests swap the seam out for
//! a recording fake.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::{Child, Command, Stdio},
};
use tracing::{debug, instrument};

/// Description of a single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
}

impl Invocation {
    /// Construct new invocation of target program without arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run invocation through `sudo`.
    ///
    /// Only meaningful on Unix. The original program becomes the first
    /// argument of `sudo`.
    pub fn elevated(self) -> Self {
        let mut args = vec![self.program];
        args.extend(self.args);
        Self {
            program: "sudo".into(),
            args,
        }
    }

    /// Name of program to execute.
    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    /// Arguments to pass to program.
    pub fn arguments(&self) -> &[OsString] {
        self.args.as_slice()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(fmt, " {}", quote(arg))?;
        }

        Ok(())
    }
}

fn quote(value: &OsStr) -> String {
    let value = value.to_string_lossy();
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.into_owned()
    }
}

/// Execute external programs.
///
/// Layer of indirection for everything that leaves the process to do work.
pub trait Shell: Send + Sync + 'static {
    /// Run invocation to completion, capturing standard output.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::Spawn`] if program cannot be started.
    /// - Return [`ShellError::Failed`] if program exits unsuccessfully.
    fn run(&self, invocation: &Invocation) -> Result<String>;

    /// Run invocation to completion with inherited standard streams.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::Spawn`] if program cannot be started.
    /// - Return [`ShellError::Failed`] if program exits unsuccessfully.
    fn run_interactive(&self, invocation: &Invocation) -> Result<()>;

    /// Start invocation in the background with silenced standard streams.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::Spawn`] if program cannot be started.
    fn spawn(&self, invocation: &Invocation) -> Result<Child>;

    /// Check if program can be found on `PATH`.
    fn exists(&self, program: &str) -> bool;
}

/// Execute external programs through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Shell for SystemShell {
    #[instrument(skip(self), fields(cmd = %invocation), level = "debug")]
    fn run(&self, invocation: &Invocation) -> Result<String> {
        let output = invocation
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ShellError::Spawn {
                source: err,
                command: invocation.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        if !output.status.success() {
            return Err(ShellError::Failed {
                command: invocation.to_string(),
                message: chomp(if stderr.is_empty() { &stdout } else { &stderr }),
            });
        }

        debug!("exited successfully");
        Ok(stdout)
    }

    #[instrument(skip(self), fields(cmd = %invocation), level = "debug")]
    fn run_interactive(&self, invocation: &Invocation) -> Result<()> {
        let status = invocation
            .to_command()
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|err| ShellError::Spawn {
                source: err,
                command: invocation.to_string(),
            })?;

        if !status.success() {
            return Err(ShellError::Failed {
                command: invocation.to_string(),
                message: status.to_string(),
            });
        }

        Ok(())
    }

    #[instrument(skip(self), fields(cmd = %invocation), level = "debug")]
    fn spawn(&self, invocation: &Invocation) -> Result<Child> {
        invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| ShellError::Spawn {
                source: err,
                command: invocation.to_string(),
            })
    }

    fn exists(&self, program: &str) -> bool {
        find_program(program).is_some()
    }
}

/// Locate program on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: &str) -> String {
    message.trim_end_matches(['\r', '\n']).to_string()
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Program could not be started at all.
    #[error("failed to start {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Program ran but reported failure.
    #[error("command {command:?} failed: {message}")]
    Failed { command: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = ShellError> = std::result::Result<T, E>;


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_invocation_with_quotes() {
        let result = Invocation::new("net")
            .args(["stop", "Plex Media Server"])
            .to_string();
        assert_eq!(result, r#"net stop "Plex Media Server""#);
    }

    #[test]
    fn elevate_invocation_through_sudo() {
        let result = Invocation::new("apt-get").args(["-y", "upgrade"]).elevated();
        assert_eq!(result.program(), "sudo");
        assert_eq!(result.to_string(), "sudo apt-get -y upgrade");
    }

    #[test]
    fn chomp_trailing_newlines() {
        assert_eq!(chomp("done\r\n"), "done");
        assert_eq!(chomp("done\n\n"), "done");
        assert_eq!(chomp("done"), "done");
    }
}
