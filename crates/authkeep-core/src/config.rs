use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::key::AppCoordinates;
use crate::persistence::{FilePersistence, InMemoryPersistence, SharedPersistence};

/// App name used when the config does not set one.
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// A backend variant that can be named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    None,
    Local,
    Session,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::None, BackendKind::Local, BackendKind::Session];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "memory" => Some(BackendKind::None),
            "local" => Some(BackendKind::Local),
            "session" => Some(BackendKind::Session),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Local => "local",
            BackendKind::Session => "session",
        }
    }
}

/// Session store configuration (authkeep.json).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub api_key: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Backends probed at startup, highest priority first.
    #[serde(default = "default_hierarchy")]
    pub hierarchy: Vec<BackendKind>,
    /// Directory holding the file-backed stores. Defaults to the platform's
    /// local data directory.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_hierarchy() -> Vec<BackendKind> {
    vec![BackendKind::Local, BackendKind::Session]
}

impl StoreConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_name: default_app_name(),
            hierarchy: default_hierarchy(),
            storage_dir: None,
        }
    }

    /// Default config file location: `<config dir>/authkeep/authkeep.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("authkeep").join("authkeep.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_err = |message: String| StoreError::Config {
            file: path.to_path_buf(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: StoreConfig =
            serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))?;
        if config.api_key.is_empty() {
            return Err(config_err("apiKey must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn coordinates(&self) -> AppCoordinates {
        AppCoordinates::new(&self.api_key, &self.app_name)
    }

    /// Directory for file-backed stores, if one can be determined.
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("authkeep")))
    }

    /// Instantiate a single backend of the given kind.
    pub fn build_backend(&self, kind: BackendKind) -> Result<SharedPersistence> {
        if kind == BackendKind::None {
            return Ok(Arc::new(InMemoryPersistence::new()));
        }
        let dir = self.resolved_storage_dir().ok_or_else(|| StoreError::Config {
            file: PathBuf::new(),
            message: "no storage directory configured and no platform data directory found"
                .to_string(),
        })?;
        let backend: SharedPersistence = match kind {
            BackendKind::Session => Arc::new(FilePersistence::session(dir.join("session.json"))),
            _ => Arc::new(FilePersistence::local(dir.join("local.json"))),
        };
        Ok(backend)
    }

    /// Instantiate the configured hierarchy, preserving its order.
    pub fn build_hierarchy(&self) -> Result<Vec<SharedPersistence>> {
        self.hierarchy
            .iter()
            .map(|&kind| self.build_backend(kind))
            .collect()
    }
}
