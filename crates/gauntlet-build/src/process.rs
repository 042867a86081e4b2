//! Child process execution
//!
//! [`ProcessRunner`] is the seam between the harness and the operating
//! system. [`SystemProcessRunner`] drains stdout and stderr concurrently with
//! the child and then allows a bounded grace period for both streams to
//! finish once the child has exited.

use crate::error::{BuildError, BuildResult};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// A program to launch with its arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable path or name resolved through `PATH`
    pub program: PathBuf,
    /// Arguments passed verbatim
    pub args: Vec<String>,
    /// Working directory for the child
    pub working_dir: Option<PathBuf>,
    /// Send the child's output straight to this process's console
    pub inherit_output: bool,
}

impl Invocation {
    /// Create an invocation with no arguments
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            inherit_output: false,
        }
    }

    /// Append one argument
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[inline]
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`
    #[inline]
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Let the child write to this process's stdout and stderr.
    ///
    /// Nothing is captured, so the [`ProcessOutput`] streams stay empty.
    #[inline]
    #[must_use]
    pub fn inheriting_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Program name for messages
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Exit code and captured streams of a finished child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the child was terminated by a signal
    pub exit_code: i32,
    /// Captured standard output, empty when inherited
    pub stdout: String,
    /// Captured standard error, empty when inherited
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the child exited with code zero
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches child processes
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, capturing both output streams
    async fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    drain_grace: Duration,
}

impl SystemProcessRunner {
    /// Create with the given post-exit drain grace period
    #[inline]
    #[must_use]
    pub fn new(drain_grace: Duration) -> Self {
        Self { drain_grace }
    }

    /// Configured grace period
    #[inline]
    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        self.drain_grace
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new(crate::DEFAULT_DRAIN_GRACE)
    }
}

#[async_trait::async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        let program = invocation.program_name();
        debug!(%program, args = ?invocation.args, "starting process");

        let output = || {
            if invocation.inherit_output {
                Stdio::inherit()
            } else {
                Stdio::piped()
            }
        };
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| BuildError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = child
            .wait()
            .await
            .map_err(|source| BuildError::io_error(&invocation.program, source))?;

        let stdout = self.finish_drain(stdout, &program).await?;
        let stderr = self.finish_drain(stderr, &program).await?;
        let exit_code = status.code().unwrap_or(-1);
        debug!(%program, exit_code, "process exited");

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

impl SystemProcessRunner {
    async fn finish_drain(
        &self,
        task: JoinHandle<std::io::Result<String>>,
        program: &str,
    ) -> BuildResult<String> {
        let not_drained = || BuildError::OutputNotDrained {
            program: program.to_string(),
        };
        match tokio::time::timeout(self.drain_grace, task).await {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(source))) => Err(BuildError::io_error(program, source)),
            Ok(Err(_)) | Err(_) => Err(not_drained()),
        }
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<std::io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut bytes = Vec::new();
        if let Some(mut reader) = reader {
            reader.read_to_end(&mut bytes).await?;
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}
