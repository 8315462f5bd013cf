use crate::models::EngineAction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8055;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTimeouts {
    pub init_secs: u64,
    pub plan_secs: u64,
    pub apply_secs: u64,
    pub destroy_secs: u64,
    pub show_secs: u64,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            init_secs: 10 * 60,
            plan_secs: 5 * 60,
            apply_secs: 30 * 60,
            destroy_secs: 30 * 60,
            show_secs: 2 * 60,
        }
    }
}

impl EngineTimeouts {
    pub fn for_action(&self, action: EngineAction) -> Duration {
        let secs = match action {
            EngineAction::Init => self.init_secs,
            EngineAction::Plan => self.plan_secs,
            EngineAction::Apply => self.apply_secs,
            EngineAction::Destroy => self.destroy_secs,
            EngineAction::ShowState => self.show_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workspace_root: PathBuf,
    pub status_file: PathBuf,
    pub templates_dir: PathBuf,
    pub tofu_path: PathBuf,
    pub allow_origins: Vec<String>,
    pub auth: AuthConfig,
    pub timeouts: EngineTimeouts,
    pub max_output_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            workspace_root: crate::paths::workspaces_dir()
                .unwrap_or_else(|_| PathBuf::from("data/workspaces")),
            status_file: crate::paths::status_file()
                .unwrap_or_else(|_| PathBuf::from("data/running-status.json")),
            templates_dir: crate::paths::templates_dir()
                .unwrap_or_else(|_| PathBuf::from("templates")),
            tofu_path: PathBuf::from("tofu"),
            allow_origins: vec!["*".to_string()],
            auth: AuthConfig::default(),
            timeouts: EngineTimeouts::default(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = Self::from_conf_file()? {
            config.apply_file(file_config);
        }

        config.apply_env(|key| std::env::var(key).ok());

        let root = crate::paths::install_root()?;
        config.normalize_paths(&root)?;
        config.validate()?;
        Ok(config)
    }

    fn from_conf_file() -> Result<Option<FileConfig>> {
        let path = crate::paths::conf_dir()?.join("config.json");
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file_config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(Some(file_config))
    }

    fn apply_file(&mut self, file_config: FileConfig) {
        if let Some(host) = file_config.host {
            self.host = host;
        }
        if let Some(port) = file_config.port {
            self.port = port;
        }
        if let Some(workspace_root) = file_config.workspace_root {
            self.workspace_root = PathBuf::from(workspace_root);
        }
        if let Some(status_file) = file_config.status_file {
            self.status_file = PathBuf::from(status_file);
        }
        if let Some(templates_dir) = file_config.templates_dir {
            self.templates_dir = PathBuf::from(templates_dir);
        }
        if let Some(tofu_path) = file_config.tofu_path {
            self.tofu_path = PathBuf::from(tofu_path);
        }
        if let Some(allow_origins) = file_config.allow_origins {
            self.allow_origins = allow_origins;
        }
        if let Some(auth) = file_config.auth {
            self.auth = auth;
        }
        if let Some(timeouts) = file_config.timeouts {
            let current = &mut self.timeouts;
            current.init_secs = timeouts.init_secs.unwrap_or(current.init_secs);
            current.plan_secs = timeouts.plan_secs.unwrap_or(current.plan_secs);
            current.apply_secs = timeouts.apply_secs.unwrap_or(current.apply_secs);
            current.destroy_secs = timeouts.destroy_secs.unwrap_or(current.destroy_secs);
            current.show_secs = timeouts.show_secs.unwrap_or(current.show_secs);
        }
        if let Some(max_output_bytes) = file_config.max_output_bytes {
            self.max_output_bytes = max_output_bytes;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT") {
            self.port = port.parse().unwrap_or(DEFAULT_PORT);
        }
        if let Some(root) = var("TERRARIUM_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(status_file) = var("TERRARIUM_STATUS_FILE") {
            self.status_file = PathBuf::from(status_file);
        }
        if let Some(templates_dir) = var("TERRARIUM_TEMPLATES_DIR") {
            self.templates_dir = PathBuf::from(templates_dir);
        }
        if let Some(tofu_path) = var("TOFU_PATH") {
            self.tofu_path = PathBuf::from(tofu_path);
        }
        if let Some(origins) = var("TERRARIUM_ALLOW_ORIGINS") {
            self.allow_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(enabled) = var("TERRARIUM_API_AUTH_ENABLED") {
            // Anything other than an exact "true" leaves auth off.
            self.auth.enabled = enabled.trim() == "true";
        }
        if let Some(username) = var("TERRARIUM_API_USERNAME") {
            self.auth.username = username;
        }
        if let Some(password) = var("TERRARIUM_API_PASSWORD") {
            self.auth.password = password;
        }
    }

    fn normalize_paths(&mut self, root: &Path) -> Result<()> {
        self.workspace_root = crate::paths::resolve_under(root, &self.workspace_root)?;
        self.status_file = crate::paths::resolve_under(root, &self.status_file)?;
        self.templates_dir = crate::paths::resolve_under(root, &self.templates_dir)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tofu_path.as_os_str().is_empty() {
            anyhow::bail!("tofu_path cannot be empty");
        }
        if self.allow_origins.is_empty() {
            anyhow::bail!("allow_origins must list at least one origin");
        }
        if self.auth.enabled && (self.auth.username.is_empty() || self.auth.password.is_empty()) {
            anyhow::bail!("API auth is enabled but username or password is empty");
        }
        if self.max_output_bytes == 0 {
            anyhow::bail!("max_output_bytes must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    workspace_root: Option<String>,
    status_file: Option<String>,
    templates_dir: Option<String>,
    tofu_path: Option<String>,
    allow_origins: Option<Vec<String>>,
    auth: Option<AuthConfig>,
    timeouts: Option<FileTimeouts>,
    max_output_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FileTimeouts {
    init_secs: Option<u64>,
    plan_secs: Option<u64>,
    apply_secs: Option<u64>,
    destroy_secs: Option<u64>,
    show_secs: Option<u64>,
}
