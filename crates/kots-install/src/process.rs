//! Child process execution.
//!
//! Every external CLI (`aws`, `kubectl kots`) is started through the
//! [`ProcessRunner`] trait so the orchestration can be exercised without
//! spawning anything.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Placeholder printed instead of secret arguments.
const REDACTED: &str = "********";

/// Errors raised while starting a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A tool search path could not be joined into `PATH`.
    #[error("invalid tool search path: {0}")]
    InvalidSearchPath(#[from] std::env::JoinPathsError),
}

/// A command line to execute.
///
/// Arguments added with [`CommandSpec::secret_arg`] are masked whenever the
/// command is displayed or debug-printed.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    secret_args: Vec<usize>,
}

impl CommandSpec {
    /// Start a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_args: Vec::new(),
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that must never be logged.
    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw arguments, secrets included.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The argument following `flag`, if any.
    #[must_use]
    pub fn value_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    fn display_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().enumerate().map(|(i, a)| {
            if self.secret_args.contains(&i) {
                REDACTED
            } else {
                a.as_str()
            }
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.display_args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.display_args().collect::<Vec<_>>())
            .finish()
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` if terminated by a signal.
    pub status: Option<i32>,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Stdout as (lossy) UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Trimmed stderr as (lossy) UTF-8.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Human readable exit status.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.status
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
    }
}

/// Runs external commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion and capture its output.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// `PATH` passed to children, `None` to inherit.
    path: Option<OsString>,
}

impl SystemRunner {
    /// Runner that inherits the current `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner whose children see `search_paths` ahead of the inherited `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if a path contains the platform path separator.
    pub fn with_search_paths(search_paths: &[PathBuf]) -> Result<Self, ProcessError> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let combined = search_paths
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        let path = std::env::join_paths(combined)?;
        debug!(path = %path.to_string_lossy(), "Configured child PATH");
        Ok(Self { path: Some(path) })
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        debug!(command = %command, "Running command");

        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(path) = &self.path {
            cmd.env("PATH", path);
        }

        let output = cmd.output().await.map_err(|source| ProcessError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
