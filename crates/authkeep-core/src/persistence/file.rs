use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{BackendType, Persistence};
use crate::error::{Result, StoreError};

/// Durable backend that keeps all keys in a single JSON object on disk.
///
/// The file is read on every access and rewritten on every mutation, so two
/// handles pointing at the same path observe each other's writes. Writes land
/// in a uniquely named sibling temp file first and are renamed into place, so
/// a reader never sees a half-written file. Read-modify-write is only
/// serialised within one handle: concurrent `set`s on the same key through
/// two handles are last-writer-wins, and concurrent writes to different keys
/// through two handles can drop one of them.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    backend_type: BackendType,
    /// Serialises read-modify-write cycles through this handle.
    lock: Mutex<()>,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>, backend_type: BackendType) -> Self {
        Self {
            path: path.into(),
            backend_type,
            lock: Mutex::new(()),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::new(path, BackendType::Local)
    }

    pub fn session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, BackendType::Session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, message: impl std::fmt::Display) -> StoreError {
        StoreError::unavailable(
            self.backend_type.clone(),
            format!("{}: {message}", self.path.display()),
        )
    }

    async fn read_map(&self) -> Result<Map<String, Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.unavailable(e)),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.unavailable("storage file is not a JSON object")),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn write_map(&self, map: Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| self.unavailable(e))?;
        let text = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(StoreError::Serialization)?;

        // Each write gets its own temp file, so concurrent writers through
        // different handles never clobber each other's staging file.
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(text.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| self.unavailable(e))?;
        written.map_err(|e| self.unavailable(e))
    }
}

#[async_trait]
impl Persistence for FilePersistence {
    fn backend_type(&self) -> BackendType {
        self.backend_type.clone()
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(map).await
    }
}
