use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Init,
    Plan,
    Apply,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Init => "init",
            Action::Plan => "plan",
            Action::Apply => "apply",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Why an operation ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Engine,
    Timeout,
    Unavailable,
    Interrupted,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationKey {
    pub resource_group_id: String,
    pub scope: String,
    pub action: Action,
}

impl OperationKey {
    pub fn new(resource_group_id: &str, scope: &str, action: Action) -> Self {
        Self {
            resource_group_id: resource_group_id.to_string(),
            scope: scope.to_string(),
            action,
        }
    }

    pub fn matches(&self, resource_group_id: &str, scope: Option<&str>) -> bool {
        self.resource_group_id == resource_group_id
            && scope.is_none_or(|scope| self.scope == scope)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_group_id, self.scope, self.action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub resource_group_id: String,
    pub scope: String,
    pub action: Action,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub failure_kind: Option<FailureKind>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Identifies the lease currently holding a running record. Never persisted.
    #[serde(skip)]
    pub(crate) lease_id: Option<Uuid>,
}

impl OperationRecord {
    pub fn running(key: &OperationKey, lease_id: Uuid) -> Self {
        Self {
            resource_group_id: key.resource_group_id.clone(),
            scope: key.scope.clone(),
            action: key.action,
            status: OperationStatus::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            last_error: None,
            failure_kind: None,
            summary: None,
            lease_id: Some(lease_id),
        }
    }

    pub fn key(&self) -> OperationKey {
        OperationKey::new(&self.resource_group_id, &self.scope, self.action)
    }

    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.finished_at = Some(Utc::now());
        self.lease_id = None;
        match outcome {
            Outcome::Succeeded { summary } => {
                self.status = OperationStatus::Succeeded;
                self.summary = summary;
                self.last_error = None;
                self.failure_kind = None;
            }
            Outcome::Failed { kind, message } => {
                self.status = OperationStatus::Failed;
                self.summary = None;
                self.last_error = Some(message);
                self.failure_kind = Some(kind);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { summary: Option<String> },
    Failed { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            message: message.into(),
        }
    }
}
