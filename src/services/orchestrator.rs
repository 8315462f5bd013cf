use crate::blueprint::BlueprintGenerator;
use crate::error::{AppError, Result};
use crate::executor::EngineDriver;
use crate::models::{Action, EngineAction, ExecutionResult, FailureKind, OperationRecord, Outcome};
use crate::tracker::{Lease, StatusTracker};
use crate::workspace::{Marker, WorkspaceHandle, WorkspaceManager};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub resource_group_id: String,
    pub scope: String,
    pub action: EngineAction,
    pub summary: Option<String>,
    pub output: String,
    pub elapsed_ms: u64,
}

impl OperationReport {
    fn new(workspace: &WorkspaceHandle, result: ExecutionResult) -> Self {
        Self {
            resource_group_id: workspace.resource_group_id().to_string(),
            scope: workspace.scope().to_string(),
            action: result.action,
            summary: result.summary,
            output: result.output,
            elapsed_ms: result.elapsed.as_millis() as u64,
        }
    }
}

type AfterSuccess = fn(&WorkspaceHandle) -> Result<()>;

fn mark_initialized(workspace: &WorkspaceHandle) -> Result<()> {
    workspace.set_marker(Marker::Initialized)
}

fn mark_planned(workspace: &WorkspaceHandle) -> Result<()> {
    workspace.set_marker(Marker::Planned)
}

fn mark_applied(workspace: &WorkspaceHandle) -> Result<()> {
    workspace.set_marker(Marker::Applied)?;
    workspace.clear_marker(Marker::Planned)
}

fn mark_destroyed(workspace: &WorkspaceHandle) -> Result<()> {
    workspace.clear_marker(Marker::Applied)?;
    workspace.clear_marker(Marker::Planned)
}

fn require_initialized(workspace: &WorkspaceHandle) -> Result<()> {
    if !workspace.has_marker(Marker::Initialized) {
        return Err(AppError::InitRequired {
            resource_group_id: workspace.resource_group_id().to_string(),
            scope: workspace.scope().to_string(),
        });
    }
    Ok(())
}

#[derive(Clone)]
pub struct Orchestrator {
    tracker: StatusTracker,
    workspaces: WorkspaceManager,
    blueprints: BlueprintGenerator,
    driver: Arc<dyn EngineDriver>,
    templates_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        tracker: StatusTracker,
        workspaces: WorkspaceManager,
        driver: Arc<dyn EngineDriver>,
        templates_dir: PathBuf,
    ) -> Self {
        Self {
            blueprints: BlueprintGenerator::new(workspaces.clone()),
            tracker,
            workspaces,
            driver,
            templates_dir,
        }
    }

    pub async fn init(&self, resource_group_id: &str, scope: &str) -> Result<OperationReport> {
        let (lease, workspace) = self.lease(resource_group_id, scope, Action::Init, |_| {
            let workspace = self.workspaces.ensure(resource_group_id, scope)?;
            let copied = self
                .workspaces
                .install_templates(&workspace, &self.templates_dir)?;
            tracing::debug!(resource_group_id, scope, copied, "Templates installed");
            Ok(())
        })?;
        self.execute(lease, workspace, mark_initialized).await
    }

    /// Writes the blueprint for a scope. No lease is taken since the engine
    /// is not invoked, but the write happens under the tracker lock so no run
    /// can start on the same key until the stale plan marker is gone.
    pub fn create_blueprint(
        &self,
        resource_group_id: &str,
        scope: &str,
        payload: &Map<String, Value>,
    ) -> Result<WorkspaceHandle> {
        self.workspaces.path_for(resource_group_id, scope)?;
        self.tracker.unless_running(resource_group_id, scope, || {
            let workspace = self.blueprints.generate(resource_group_id, scope, payload)?;
            workspace.clear_marker(Marker::Planned)?;
            Ok(workspace)
        })
    }

    pub async fn plan(&self, resource_group_id: &str, scope: &str) -> Result<OperationReport> {
        let (lease, workspace) = self.lease(resource_group_id, scope, Action::Plan, |workspace| {
            require_initialized(workspace)?;
            if !workspace.has_blueprint() {
                return Err(AppError::Validation(format!(
                    "blueprint required for {}/{}",
                    resource_group_id, scope
                )));
            }
            Ok(())
        })?;
        self.execute(lease, workspace, mark_planned).await
    }

    pub async fn apply(&self, resource_group_id: &str, scope: &str) -> Result<OperationReport> {
        let (lease, workspace) = self.lease(resource_group_id, scope, Action::Apply, |workspace| {
            require_initialized(workspace)?;
            if !workspace.has_marker(Marker::Planned) {
                return Err(AppError::PlanRequired {
                    resource_group_id: resource_group_id.to_string(),
                    scope: scope.to_string(),
                });
            }
            Ok(())
        })?;
        self.execute(lease, workspace, mark_applied).await
    }

    pub async fn destroy(&self, resource_group_id: &str, scope: &str) -> Result<OperationReport> {
        let (lease, workspace) =
            self.lease(resource_group_id, scope, Action::Destroy, require_initialized)?;
        self.execute(lease, workspace, mark_destroyed).await
    }

    pub async fn get_state(&self, resource_group_id: &str, scope: &str) -> Result<OperationReport> {
        let workspace = self.workspaces.handle(resource_group_id, scope)?;
        if !workspace.has_marker(Marker::Applied) {
            return Err(AppError::NotInitialized {
                resource_group_id: resource_group_id.to_string(),
                scope: scope.to_string(),
            });
        }

        let result = self
            .driver
            .run(workspace.path(), EngineAction::ShowState)
            .await?;
        if !result.is_success() {
            return Err(result.into_error());
        }
        Ok(OperationReport::new(&workspace, result))
    }

    pub async fn clear_workspace(&self, resource_group_id: &str, scope: Option<&str>) -> Result<bool> {
        let workspaces = self.workspaces.clone();
        let resource_group_id = resource_group_id.to_string();
        let scope = scope.map(str::to_string);

        tokio::task::spawn_blocking(move || workspaces.clear(&resource_group_id, scope.as_deref()))
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("clear task failed: {e}")))?
    }

    pub fn status(&self, resource_group_id: &str, scope: Option<&str>) -> Result<Vec<OperationRecord>> {
        match scope {
            Some(scope) => self.workspaces.path_for(resource_group_id, scope)?,
            None => self.workspaces.resource_group_path(resource_group_id)?,
        };
        Ok(self.tracker.snapshot(resource_group_id, scope))
    }

    pub async fn engine_version(&self) -> Result<String> {
        self.driver.version().await
    }

    /// Validates identifiers, takes the lease, then checks `precondition`
    /// under it. A failed precondition hands the lease back untouched.
    fn lease(
        &self,
        resource_group_id: &str,
        scope: &str,
        action: Action,
        precondition: impl FnOnce(&WorkspaceHandle) -> Result<()>,
    ) -> Result<(Lease, WorkspaceHandle)> {
        let workspace = self.workspaces.handle(resource_group_id, scope)?;
        let lease = self.tracker.acquire(resource_group_id, scope, action)?;
        if let Err(err) = precondition(&workspace) {
            lease.abort();
            return Err(err);
        }
        Ok((lease, workspace))
    }

    /// Runs the leased action on its own task. The caller only waits on the
    /// task, so dropping the caller never kills the engine.
    async fn execute(
        &self,
        lease: Lease,
        workspace: WorkspaceHandle,
        after_success: AfterSuccess,
    ) -> Result<OperationReport> {
        let driver = Arc::clone(&self.driver);
        let action = EngineAction::from(lease.key().action);

        let task = tokio::spawn(async move {
            let result = match driver.run(workspace.path(), action).await {
                Ok(result) => result,
                Err(err) => {
                    let kind = match err {
                        AppError::EngineUnavailable(_) => FailureKind::Unavailable,
                        _ => FailureKind::Engine,
                    };
                    lease.release(Outcome::failed(kind, err.to_string()));
                    return Err(err);
                }
            };

            lease.release(result.to_outcome());
            if !result.is_success() {
                return Err(result.into_error());
            }

            if let Err(err) = after_success(&workspace) {
                tracing::error!(
                    error = %err,
                    workspace = %workspace.path().display(),
                    action = %action,
                    "Engine succeeded but the workspace marker could not be updated",
                );
                return Err(err);
            }
            Ok(OperationReport::new(&workspace, result))
        });

        task.await
            .map_err(|e| AppError::ServiceUnavailable(format!("engine task failed: {e}")))?
    }
}
