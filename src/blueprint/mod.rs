use crate::error::{AppError, Result};
use crate::paths;
use crate::workspace::{WorkspaceHandle, WorkspaceManager};
use serde_json::{Map, Value};

/// Variable carrying the owning resource group into the blueprint.
pub const RESOURCE_GROUP_VAR: &str = "terrarium-id";

#[derive(Debug, Clone, Copy)]
pub struct ScopeDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [&'static str],
}

pub const SCOPES: &[ScopeDefinition] = &[
    ScopeDefinition {
        name: "gcp-aws",
        description: "GCP to AWS VPN tunnel",
        required_fields: &[
            "my-imported-gcp-vpc-name",
            "my-imported-gcp-subnet-name",
            "my-imported-aws-vpc-id",
            "my-imported-aws-subnet-id",
        ],
    },
    ScopeDefinition {
        name: "gcp-azure",
        description: "GCP to Azure VPN tunnel",
        required_fields: &[
            "my-imported-gcp-vpc-name",
            "my-imported-gcp-subnet-name",
            "my-imported-azure-resource-group-name",
            "my-imported-azure-virtual-network-name",
            "my-imported-azure-gateway-subnet-cidr-block",
        ],
    },
];

pub fn scope_definition(scope: &str) -> Result<&'static ScopeDefinition> {
    SCOPES
        .iter()
        .find(|definition| definition.name == scope)
        .ok_or_else(|| {
            let known: Vec<_> = SCOPES.iter().map(|d| d.name).collect();
            AppError::Validation(format!(
                "Unsupported scope '{}' (expected one of: {})",
                scope,
                known.join(", ")
            ))
        })
}

impl ScopeDefinition {
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<()> {
        let mut missing = Vec::new();
        for field in self.required_fields {
            match payload.get(*field) {
                Some(Value::String(value)) if !value.trim().is_empty() => {}
                Some(Value::String(_)) | None | Some(Value::Null) => missing.push(*field),
                Some(other) => {
                    return Err(AppError::Validation(format!(
                        "Field '{}' must be a string, got {}",
                        field, other
                    )));
                }
            }
        }
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required field(s) for {}: {}",
                self.name,
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct BlueprintGenerator {
    workspaces: WorkspaceManager,
}

impl BlueprintGenerator {
    pub fn new(workspaces: WorkspaceManager) -> Self {
        Self { workspaces }
    }

    pub fn generate(
        &self,
        resource_group_id: &str,
        scope: &str,
        payload: &Map<String, Value>,
    ) -> Result<WorkspaceHandle> {
        let definition = scope_definition(scope)?;
        definition.validate(payload)?;

        let handle = self.workspaces.ensure(resource_group_id, scope)?;

        let mut variables = payload.clone();
        variables.insert(
            RESOURCE_GROUP_VAR.to_string(),
            Value::String(resource_group_id.to_string()),
        );
        let json = serde_json::to_vec_pretty(&Value::Object(variables))?;
        paths::write_file_atomic(&handle.blueprint_path(), &json)?;

        tracing::info!(
            resource_group_id,
            scope,
            path = %handle.blueprint_path().display(),
            "Blueprint written",
        );
        Ok(handle)
    }
}
