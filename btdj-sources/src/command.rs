//! Running external command-line tools
//!
//! Polling sources never spawn processes directly. They go through a
//! [`CommandRunner`] so tests can script tool output, and so every call is
//! bounded by a timeout.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Result, SourceError};

/// Executes an external program and returns its standard output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and return stdout on success
    ///
    /// A missing binary is [`SourceError::Unavailable`], a hang is
    /// [`SourceError::Timeout`] and a non-zero exit is
    /// [`SourceError::CommandFailed`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Runs programs as child processes with a per-call timeout
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        trace!(program, ?args, "Running command");

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::Unavailable(format!("{} not found", program)));
            }
            Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(SourceError::Unavailable(format!(
                    "{} is not executable",
                    program
                )));
            }
            Ok(Err(e)) => return Err(SourceError::Io(e)),
            Err(_) => {
                return Err(SourceError::Timeout {
                    program: program.to_string(),
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(program, status = ?output.status.code(), %stderr, "Command failed");
            return Err(SourceError::CommandFailed {
                program: program.to_string(),
                status: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
