use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{BackendType, Persistence};
use crate::error::Result;

/// Volatile backend. Contents live as long as the value itself.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    storage: RwLock<HashMap<String, Value>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    fn backend_type(&self) -> BackendType {
        BackendType::None
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.storage.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.storage.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.storage.write().await.remove(key);
        Ok(())
    }
}
