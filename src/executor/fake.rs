use super::{EngineDriver, output};
use crate::error::{AppError, Result};
use crate::models::{EngineAction, ExecutionOutcome, ExecutionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const FAKE_STATE: &str = "# google_compute_ha_vpn_gateway.vpn_gw:\nresource \"google_compute_ha_vpn_gateway\" \"vpn_gw\" {\n    name = \"rg-01-vpn-gw\"\n}\n";

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Succeed(String),
    Fail { exit_code: i32, output: String },
    TimeOut,
    Unavailable,
}

pub struct FakeDriver {
    responses: Mutex<HashMap<EngineAction, FakeResponse>>,
    calls: Mutex<Vec<(PathBuf, EngineAction)>>,
    delay: Duration,
}

impl Default for FakeDriver {
    fn default() -> Self {
        let responses = HashMap::from([
            (
                EngineAction::Init,
                FakeResponse::Succeed("OpenTofu has been successfully initialized!\n".to_string()),
            ),
            (
                EngineAction::Plan,
                FakeResponse::Succeed("Plan: 8 to add, 0 to change, 0 to destroy.\n".to_string()),
            ),
            (
                EngineAction::Apply,
                FakeResponse::Succeed(
                    "Apply complete! Resources: 8 added, 0 changed, 0 destroyed.\n".to_string(),
                ),
            ),
            (
                EngineAction::Destroy,
                FakeResponse::Succeed("Destroy complete! Resources: 8 destroyed.\n".to_string()),
            ),
            (EngineAction::ShowState, FakeResponse::Succeed(FAKE_STATE.to_string())),
        ]);
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }
}

impl FakeDriver {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn respond(&self, action: EngineAction, response: FakeResponse) {
        self.responses.lock().insert(action, response);
    }

    pub fn calls(&self) -> Vec<EngineAction> {
        self.calls.lock().iter().map(|(_, action)| *action).collect()
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.calls.lock().iter().map(|(path, _)| path.clone()).collect()
    }
}

#[async_trait]
impl EngineDriver for FakeDriver {
    async fn run(&self, workspace: &Path, action: EngineAction) -> Result<ExecutionResult> {
        self.calls.lock().push((workspace.to_path_buf(), action));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = self
            .responses
            .lock()
            .get(&action)
            .cloned()
            .unwrap_or(FakeResponse::Succeed(String::new()));

        let (outcome, output) = match response {
            FakeResponse::Succeed(output) => (ExecutionOutcome::Succeeded, output),
            FakeResponse::Fail { exit_code, output } => (
                ExecutionOutcome::Failed {
                    exit_code: Some(exit_code),
                },
                output,
            ),
            FakeResponse::TimeOut => (
                ExecutionOutcome::TimedOut {
                    after: Duration::from_secs(1),
                },
                String::new(),
            ),
            FakeResponse::Unavailable => {
                return Err(AppError::EngineUnavailable("fake engine offline".to_string()));
            }
        };

        let summary = match outcome {
            ExecutionOutcome::Succeeded => output::summarize(action, &output),
            _ => None,
        };
        Ok(ExecutionResult {
            action,
            outcome,
            output,
            summary,
            elapsed: self.delay,
        })
    }

    async fn version(&self) -> Result<String> {
        Ok("OpenTofu v1.8.3".to_string())
    }
}
