use super::operation::{Action, FailureKind, Outcome};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineAction {
    Init,
    Plan,
    Apply,
    Destroy,
    ShowState,
}

impl EngineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineAction::Init => "init",
            EngineAction::Plan => "plan",
            EngineAction::Apply => "apply",
            EngineAction::Destroy => "destroy",
            EngineAction::ShowState => "show",
        }
    }

    pub fn args(&self) -> &'static [&'static str] {
        match self {
            EngineAction::Init => &["init", "-input=false", "-no-color"],
            EngineAction::Plan => &["plan", "-input=false", "-no-color"],
            EngineAction::Apply => &["apply", "-input=false", "-no-color", "-auto-approve"],
            EngineAction::Destroy => &["destroy", "-input=false", "-no-color", "-auto-approve"],
            EngineAction::ShowState => &["show", "-no-color"],
        }
    }
}

impl From<Action> for EngineAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Init => EngineAction::Init,
            Action::Plan => EngineAction::Plan,
            Action::Apply => EngineAction::Apply,
            Action::Destroy => EngineAction::Destroy,
        }
    }
}

impl fmt::Display for EngineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut { after: Duration },
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub action: EngineAction,
    pub outcome: ExecutionOutcome,
    pub output: String,
    pub summary: Option<String>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ExecutionOutcome::Succeeded
    }

    pub fn to_outcome(&self) -> Outcome {
        match &self.outcome {
            ExecutionOutcome::Succeeded => Outcome::Succeeded {
                summary: self.summary.clone(),
            },
            ExecutionOutcome::Failed { exit_code } => {
                let message = if self.output.trim().is_empty() {
                    format!("{} exited with code {:?}", self.action, exit_code)
                } else {
                    self.output.clone()
                };
                Outcome::failed(FailureKind::Engine, message)
            }
            ExecutionOutcome::TimedOut { after } => Outcome::failed(
                FailureKind::Timeout,
                format!("{} timed out after {}s", self.action, after.as_secs()),
            ),
        }
    }

    pub fn into_error(self) -> AppError {
        match self.outcome {
            ExecutionOutcome::TimedOut { after } => AppError::Timeout {
                action: self.action,
                after_secs: after.as_secs(),
            },
            ExecutionOutcome::Failed { exit_code } => AppError::EngineExecutionFailed {
                action: self.action,
                exit_code,
                output: self.output,
            },
            ExecutionOutcome::Succeeded => AppError::EngineExecutionFailed {
                action: self.action,
                exit_code: Some(0),
                output: self.output,
            },
        }
    }
}
