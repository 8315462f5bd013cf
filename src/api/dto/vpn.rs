use crate::models::{FailureKind, OperationRecord, OperationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlueprintRequest {
    #[serde(default)]
    pub resource_group_id: Option<String>,
    pub tf_vars: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintResponse {
    pub resource_group_id: String,
    pub scope: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecordResponse {
    pub resource_group_id: String,
    pub scope: String,
    pub action: String,
    pub status: OperationStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub last_error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub summary: Option<String>,
}

impl From<OperationRecord> for OperationRecordResponse {
    fn from(record: OperationRecord) -> Self {
        Self {
            resource_group_id: record.resource_group_id,
            scope: record.scope,
            action: record.action.to_string(),
            status: record.status,
            started_at: record.started_at.map(|t| t.to_rfc3339()),
            finished_at: record.finished_at.map(|t| t.to_rfc3339()),
            last_error: record.last_error,
            failure_kind: record.failure_kind,
            summary: record.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, OperationKey};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn record_response_uses_persisted_names() {
        let key = OperationKey::new("rg-01", "gcp-aws", Action::Apply);
        let record = OperationRecord::running(&key, Uuid::new_v4());

        let body = serde_json::to_value(OperationRecordResponse::from(record)).unwrap();
        assert_eq!(body["action"], json!("apply"));
        assert_eq!(body["status"], json!("running"));
        assert_eq!(body["failureKind"], json!(null));
    }
}
