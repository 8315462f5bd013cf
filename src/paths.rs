use crate::error::{AppError, Result};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

const BIN_DIR: &str = "bin";
const CONF_DIR: &str = "conf";
const DATA_DIR: &str = "data";
const WORKSPACES_DIR: &str = "workspaces";
const TEMPLATES_DIR: &str = "templates";
const STATUS_FILE: &str = "running-status.json";
const HOME_ENV: &str = "TERRARIUM_HOME";

pub fn install_root() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if home.trim().is_empty() {
            return Err(AppError::Validation(
                "TERRARIUM_HOME is set but empty".to_string(),
            ));
        }
        return Ok(PathBuf::from(home));
    }

    let exe_path = std::env::current_exe()?;
    let exe_dir = exe_path.parent().ok_or_else(|| {
        AppError::Validation("Failed to resolve executable directory".to_string())
    })?;

    if exe_dir.file_name().and_then(|name| name.to_str()) == Some(BIN_DIR) {
        let root = exe_dir.parent().ok_or_else(|| {
            AppError::Validation("Failed to resolve install root from bin".to_string())
        })?;
        return Ok(root.to_path_buf());
    }

    Ok(exe_dir.to_path_buf())
}

pub fn conf_dir() -> Result<PathBuf> {
    Ok(install_root()?.join(CONF_DIR))
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(install_root()?.join(DATA_DIR))
}

pub fn workspaces_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join(WORKSPACES_DIR))
}

pub fn templates_dir() -> Result<PathBuf> {
    Ok(install_root()?.join(TEMPLATES_DIR))
}

pub fn status_file() -> Result<PathBuf> {
    Ok(data_dir()?.join(STATUS_FILE))
}

/// Resolves a configured path against `root`, refusing `..` components.
pub fn resolve_under(root: &Path, path: &Path) -> Result<PathBuf> {
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(AppError::Validation(format!(
            "Path cannot contain '..': {}",
            path.display()
        )));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(root.join(path))
}

pub fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_under_joins_relative_paths() {
        let root = Path::new("/opt/terrarium");
        let resolved = resolve_under(root, Path::new("data/status.json")).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/terrarium/data/status.json"));
    }

    #[test]
    fn resolve_under_rejects_parent_components() {
        let root = Path::new("/opt/terrarium");
        let err = resolve_under(root, Path::new("../etc/passwd")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn write_file_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.json");

        write_file_atomic(&path, b"first").unwrap();
        write_file_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
