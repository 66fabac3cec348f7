//! External command execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use remedy_core::{RemedyError, Result};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl CommandOutput {
    /// Whether the command passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

pub struct CommandRunner;

impl CommandRunner {
    /// Run `argv` in `cwd`.
    ///
    /// A binary that cannot be spawned is reported as
    /// [`RemedyError::ValidationTool`]. With a timeout, the child is killed
    /// when it expires.
    pub async fn execute(
        argv: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let start = Instant::now();

        let (exe, args) = argv
            .split_first()
            .ok_or_else(|| RemedyError::Config("empty command".to_string()))?;

        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemedyError::ValidationTool {
                tool: exe.clone(),
                reason: e.to_string(),
            })?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    RemedyError::Process(format!(
                        "{exe} timed out after {}ms",
                        limit.as_millis()
                    ))
                })??,
            None => child.wait_with_output().await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(command = %argv.join(" "), exit_code, duration_ms, "command finished");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }
}
