use super::{EngineDriver, output};
use crate::config::EngineTimeouts;
use crate::error::{AppError, Result};
use crate::models::{EngineAction, ExecutionOutcome, ExecutionResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

const VERSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TofuDriver {
    binary: PathBuf,
    timeouts: EngineTimeouts,
    max_output_bytes: usize,
}

impl TofuDriver {
    pub fn new(binary: impl Into<PathBuf>, timeouts: EngineTimeouts, max_output_bytes: usize) -> Self {
        Self {
            binary: binary.into(),
            timeouts,
            max_output_bytes,
        }
    }

    fn command(&self, work_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(work_dir);
        cmd.env("TF_IN_AUTOMATION", "1");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // The timeout drops the child; dropping must kill it.
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        AppError::EngineUnavailable(format!("failed to start {}: {}", self.binary.display(), err))
    }
}

#[async_trait]
impl EngineDriver for TofuDriver {
    async fn run(&self, workspace: &Path, action: EngineAction) -> Result<ExecutionResult> {
        let timeout = self.timeouts.for_action(action);
        let mut cmd = self.command(workspace);
        cmd.args(action.args());

        tracing::info!(
            action = %action,
            workspace = %workspace.display(),
            timeout_secs = timeout.as_secs(),
            "Running engine",
        );

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_elapsed) => {
                tracing::warn!(
                    action = %action,
                    workspace = %workspace.display(),
                    timeout_secs = timeout.as_secs(),
                    "Engine timed out and was killed",
                );
                return Ok(ExecutionResult {
                    action,
                    outcome: ExecutionOutcome::TimedOut { after: timeout },
                    output: String::new(),
                    summary: None,
                    elapsed: started.elapsed(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (outcome, summary) = if output.status.success() {
            (ExecutionOutcome::Succeeded, output::summarize(action, &stdout))
        } else {
            (
                ExecutionOutcome::Failed {
                    exit_code: output.status.code(),
                },
                None,
            )
        };

        let elapsed = started.elapsed();
        match &outcome {
            ExecutionOutcome::Succeeded => tracing::info!(
                action = %action,
                elapsed_ms = elapsed.as_millis() as u64,
                summary = summary.as_deref().unwrap_or(""),
                "Engine finished",
            ),
            _ => tracing::warn!(
                action = %action,
                elapsed_ms = elapsed.as_millis() as u64,
                exit_code = ?output.status.code(),
                "Engine failed",
            ),
        }

        Ok(ExecutionResult {
            action,
            outcome,
            output: output::truncate_tail(&output::combine(&stdout, &stderr), self.max_output_bytes),
            summary,
            elapsed,
        })
    }

    async fn version(&self) -> Result<String> {
        let mut cmd = self.command(Path::new("."));
        cmd.arg("version");

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let output = tokio::time::timeout(VERSION_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::EngineUnavailable(format!(
                    "{} version timed out after {}s",
                    self.binary.display(),
                    VERSION_TIMEOUT.as_secs()
                ))
            })??;

        if !output.status.success() {
            return Err(AppError::EngineUnavailable(format!(
                "{} version exited with {:?}: {}",
                self.binary.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
