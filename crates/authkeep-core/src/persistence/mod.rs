mod file;
mod in_memory;

pub use file::FilePersistence;
pub use in_memory::InMemoryPersistence;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::Result;

/// Identifies a persistence variant. Two backends with the same type are
/// interchangeable as far as session migration is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendType {
    /// Volatile, process-lifetime storage.
    None,
    /// Durable storage that outlives the process.
    Local,
    /// Durable storage scoped to one client session.
    Session,
    Custom(String),
}

impl BackendType {
    pub fn as_str(&self) -> &str {
        match self {
            BackendType::None => "NONE",
            BackendType::Local => "LOCAL",
            BackendType::Session => "SESSION",
            BackendType::Custom(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "NONE" => BackendType::None,
            "LOCAL" => BackendType::Local,
            "SESSION" => BackendType::Session,
            other => BackendType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BackendType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(BackendType::from_name(&name))
    }
}

/// Persistence capability — async key-value storage over an opaque medium.
///
/// Values are stored in their raw JSON form. Turning a raw value back into a
/// typed snapshot is the caller's job (see [`crate::UserSnapshot::revive`]),
/// which keeps backends free of any knowledge of what they hold.
///
/// Implementations: in-memory, JSON file, or anything else that can honour
/// get/set/remove.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Stable identifier of this variant.
    fn backend_type(&self) -> BackendType;

    /// Read the value under `key`. Returns `Ok(None)` if the key is unset.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any prior value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Shared handle to a backend.
pub type SharedPersistence = Arc<dyn Persistence>;
