use async_trait::async_trait;
use std::sync::RwLock;

use super::DocumentStore;
use crate::asset::Asset;
use crate::error::{Result, SearchError};

/// Raw documents held in memory. Used as a local cache and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<serde_json::Value>>,
}

impl MemoryStore {
    pub fn new(docs: Vec<serde_json::Value>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Store canonical assets as serialized-JSON documents.
    pub fn from_assets(assets: &[Asset]) -> Result<Self> {
        let docs = assets
            .iter()
            .map(|a| -> Result<serde_json::Value> {
                let payload = serde_json::to_string(a)?;
                Ok(serde_json::json!({ "id": a.id, "jsonData": payload }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(docs))
    }

    pub fn replace(&self, docs: Vec<serde_json::Value>) {
        if let Ok(mut guard) = self.docs.write() {
            *guard = docs;
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, limit: usize) -> Result<Vec<serde_json::Value>> {
        let guard = self
            .docs
            .read()
            .map_err(|_| SearchError::BackendUnavailable("memory store lock poisoned".into()))?;
        Ok(guard.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
