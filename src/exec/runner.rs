// src/exec/runner.rs

//! Running a single shell command.
//!
//! The block executor talks to a [`StepRunner`] instead of spawning
//! processes itself, so tests can script step outcomes without touching the
//! OS. [`ShellStepRunner`] is the production implementation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::Result;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Process exit code; `None` if the process was killed by a signal or by
    /// the timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl StepOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Trait abstracting how a single step command is executed.
///
/// An `Err` means the command could not be run at all (e.g. spawn failure);
/// a command that ran and exited non-zero is an `Ok` with a failing
/// [`StepOutput`].
pub trait StepRunner: Send + Sync {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<StepOutput>> + Send + 'a>>;
}

/// Runs commands through the platform shell (`sh -c`, or `cmd /C` on
/// Windows).
///
/// Child processes are spawned with `kill_on_drop`, so dropping the future
/// (timeout, shutdown abort) kills the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellStepRunner;

impl ShellStepRunner {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

impl StepRunner for ShellStepRunner {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<StepOutput>> + Send + 'a>> {
        Box::pin(async move {
            let mut cmd = shell_command(command);
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let child = cmd
                .spawn()
                .with_context(|| format!("spawning process for command '{}'", command))?;

            let waited = match timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!(cmd = %command, ?limit, "command timed out; killed");
                        return Ok(StepOutput {
                            exit_code: None,
                            timed_out: true,
                            ..StepOutput::default()
                        });
                    }
                },
                None => child.wait_with_output().await,
            };

            let output =
                waited.with_context(|| format!("waiting for process of command '{}'", command))?;

            let out = StepOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
            };

            for line in out.stderr.lines() {
                debug!(cmd = %command, "stderr: {}", line);
            }

            Ok(out)
        })
    }
}
