//! External command execution for the shell-level probes.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::ProbeCommand;
use crate::error::ProbeError;

/// Captured result of one finished external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a probe command to completion.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and capture its output.
    /// A non-zero exit is still `Ok`; only a failure to launch is an error.
    async fn run(&self, command: &ProbeCommand) -> Result<CommandOutput, ProbeError>;
}

/// Spawns real OS processes. No environment isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ProbeCommand) -> Result<CommandOutput, ProbeError> {
        let start = Instant::now();

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProbeError::Launch {
                program: command.program.clone(),
                source,
            })?;

        let elapsed = start.elapsed();
        let exit_code = output.status.code();

        if output.status.success() {
            debug!(command = %command, ?elapsed, "command executed successfully");
        } else {
            warn!(command = %command, ?exit_code, "command returned a non-zero exit status");
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed,
        })
    }
}
