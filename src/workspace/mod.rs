use crate::error::{AppError, Result};
use crate::tracker::StatusTracker;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const MARKER_DIR: &str = ".terrarium";
pub const BLUEPRINT_FILE: &str = "terraform.tfvars.json";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("identifier pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Initialized,
    Planned,
    Applied,
}

impl Marker {
    fn file_name(&self) -> &'static str {
        match self {
            Marker::Initialized => "initialized",
            Marker::Planned => "planned",
            Marker::Applied => "applied",
        }
    }
}

pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.contains("..") || !IDENTIFIER.is_match(value) {
        return Err(AppError::InvalidIdentifier(format!("{kind} '{value}'")));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct WorkspaceHandle {
    resource_group_id: String,
    scope: String,
    path: PathBuf,
}

impl WorkspaceHandle {
    pub fn resource_group_id(&self) -> &str {
        &self.resource_group_id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn blueprint_path(&self) -> PathBuf {
        self.path.join(BLUEPRINT_FILE)
    }

    pub fn has_blueprint(&self) -> bool {
        self.blueprint_path().is_file()
    }

    fn marker_path(&self, marker: Marker) -> PathBuf {
        self.path.join(MARKER_DIR).join(marker.file_name())
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        self.marker_path(marker).is_file()
    }

    pub fn set_marker(&self, marker: Marker) -> Result<()> {
        let path = self.marker_path(marker);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, chrono::Utc::now().to_rfc3339())?;
        Ok(())
    }

    pub fn clear_marker(&self, marker: Marker) -> Result<()> {
        match std::fs::remove_file(self.marker_path(marker)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    tracker: StatusTracker,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, tracker: StatusTracker) -> Self {
        Self {
            root: root.into(),
            tracker,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resource_group_path(&self, resource_group_id: &str) -> Result<PathBuf> {
        validate_identifier("resource group id", resource_group_id)?;
        Ok(self.root.join(resource_group_id))
    }

    pub fn path_for(&self, resource_group_id: &str, scope: &str) -> Result<PathBuf> {
        validate_identifier("scope", scope)?;
        Ok(self.resource_group_path(resource_group_id)?.join(scope))
    }

    pub fn handle(&self, resource_group_id: &str, scope: &str) -> Result<WorkspaceHandle> {
        Ok(WorkspaceHandle {
            path: self.path_for(resource_group_id, scope)?,
            resource_group_id: resource_group_id.to_string(),
            scope: scope.to_string(),
        })
    }

    pub fn ensure(&self, resource_group_id: &str, scope: &str) -> Result<WorkspaceHandle> {
        let handle = self.handle(resource_group_id, scope)?;
        std::fs::create_dir_all(handle.path())?;
        Ok(handle)
    }

    /// Removes a resource group (or one of its scopes). Clearing something
    /// that does not exist succeeds; clearing during a live run does not.
    pub fn clear(&self, resource_group_id: &str, scope: Option<&str>) -> Result<bool> {
        let path = match scope {
            Some(scope) => self.path_for(resource_group_id, scope)?,
            None => self.resource_group_path(resource_group_id)?,
        };

        let removed = self.tracker.clear_with(resource_group_id, scope, || {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(err.into()),
            }
        })?;

        if removed {
            tracing::info!(path = %path.display(), "Workspace cleared");
        } else {
            tracing::debug!(path = %path.display(), "Workspace already absent");
        }
        Ok(removed)
    }

    pub fn install_templates(&self, handle: &WorkspaceHandle, templates_root: &Path) -> Result<usize> {
        let source = templates_root.join(handle.scope());
        if !source.is_dir() {
            tracing::debug!(
                scope = handle.scope(),
                templates = %source.display(),
                "No templates for scope",
            );
            return Ok(0);
        }
        copy_tree(&source, handle.path())
    }
}

fn copy_tree(source: &Path, target: &Path) -> Result<usize> {
    std::fs::create_dir_all(target)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let destination = target.join(entry.file_name());
        if file_type.is_dir() {
            copied += copy_tree(&entry.path(), &destination)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &destination)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, Outcome};
    use tempfile::TempDir;

    fn manager() -> (TempDir, WorkspaceManager, StatusTracker) {
        let dir = TempDir::new().unwrap();
        let tracker = StatusTracker::in_memory();
        let manager = WorkspaceManager::new(dir.path().join("workspaces"), tracker.clone());
        (dir, manager, tracker)
    }

    #[test]
    fn path_for_rejects_traversal() {
        let (_dir, manager, _) = manager();
        for (rg, scope) in [
            ("../etc", "x"),
            ("rg-01", ".."),
            ("rg/01", "gcp-aws"),
            ("rg-01", "gcp\\aws"),
            ("", "gcp-aws"),
            ("rg-01", ".hidden"),
            ("rg..01", "gcp-aws"),
        ] {
            let err = manager.path_for(rg, scope).unwrap_err();
            assert!(matches!(err, AppError::InvalidIdentifier(_)), "{rg}/{scope}");
        }
    }

    #[test]
    fn path_for_is_deterministic() {
        let (_dir, manager, _) = manager();
        let first = manager.path_for("rg-01", "gcp-aws").unwrap();
        let second = manager.path_for("rg-01", "gcp-aws").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, manager.root().join("rg-01").join("gcp-aws"));
        assert_ne!(first, manager.path_for("rg-01", "gcp-azure").unwrap());
    }

    #[test]
    fn ensure_is_idempotent() {
        let (_dir, manager, _) = manager();
        let handle = manager.ensure("rg-01", "gcp-aws").unwrap();
        std::fs::write(handle.path().join("main.tf"), "# keep").unwrap();

        let again = manager.ensure("rg-01", "gcp-aws").unwrap();
        assert_eq!(handle.path(), again.path());
        assert!(again.path().join("main.tf").is_file());
    }

    #[test]
    fn markers_round_trip() {
        let (_dir, manager, _) = manager();
        let handle = manager.ensure("rg-01", "gcp-aws").unwrap();
        assert!(!handle.has_marker(Marker::Initialized));

        handle.set_marker(Marker::Initialized).unwrap();
        assert!(handle.has_marker(Marker::Initialized));

        handle.clear_marker(Marker::Initialized).unwrap();
        handle.clear_marker(Marker::Initialized).unwrap();
        assert!(!handle.has_marker(Marker::Initialized));
    }

    #[test]
    fn clear_twice_succeeds() {
        let (_dir, manager, _) = manager();
        manager.ensure("rg-01", "gcp-aws").unwrap();

        assert!(manager.clear("rg-01", None).unwrap());
        assert!(!manager.clear("rg-01", None).unwrap());
        assert!(!manager.resource_group_path("rg-01").unwrap().exists());
    }

    #[test]
    fn clear_single_scope_keeps_siblings() {
        let (_dir, manager, _) = manager();
        manager.ensure("rg-01", "gcp-aws").unwrap();
        let azure = manager.ensure("rg-01", "gcp-azure").unwrap();

        manager.clear("rg-01", Some("gcp-aws")).unwrap();
        assert!(!manager.path_for("rg-01", "gcp-aws").unwrap().exists());
        assert!(azure.exists());
    }

    #[test]
    fn clear_refuses_during_live_run() {
        let (_dir, manager, tracker) = manager();
        let handle = manager.ensure("rg-01", "gcp-aws").unwrap();
        let lease = tracker.acquire("rg-01", "gcp-aws", Action::Apply).unwrap();

        let err = manager.clear("rg-01", None).unwrap_err();
        assert!(matches!(err, AppError::WorkspaceInUse(_)));
        assert!(handle.exists());

        lease.release(Outcome::Succeeded { summary: None });
        manager.clear("rg-01", None).unwrap();
        assert!(!handle.exists());
    }

    #[test]
    fn install_templates_copies_scope_sources() {
        let (dir, manager, _) = manager();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(templates.join("gcp-aws").join("modules")).unwrap();
        std::fs::write(templates.join("gcp-aws").join("main.tf"), "terraform {}").unwrap();
        std::fs::write(
            templates.join("gcp-aws").join("modules").join("vpn.tf"),
            "resource {}",
        )
        .unwrap();

        let handle = manager.ensure("rg-01", "gcp-aws").unwrap();
        assert_eq!(manager.install_templates(&handle, &templates).unwrap(), 2);
        assert!(handle.path().join("modules").join("vpn.tf").is_file());

        let azure = manager.ensure("rg-01", "gcp-azure").unwrap();
        assert_eq!(manager.install_templates(&azure, &templates).unwrap(), 0);
    }
}
