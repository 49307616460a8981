//! In-memory storage backend
//!
//! Keeps metadata and data in two `tokio::sync::RwLock` maps. Contents live
//! for the lifetime of the process.

use super::StorageBackend;
use crate::error::Result;
use crate::fragment::{FragmentRecord, Listing};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Key = (String, String);

fn key(owner_id: &str, id: &str) -> Key {
    (owner_id.to_string(), id.to_string())
}

/// Volatile backend for development and tests
pub struct MemoryBackend {
    metadata: Arc<RwLock<HashMap<Key, FragmentRecord>>>,
    data: Arc<RwLock<HashMap<Key, Bytes>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self {
            metadata: Arc::new(RwLock::new(HashMap::new())),
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list(&self, owner_id: &str, expand: bool) -> Result<Listing> {
        let records = self
            .metadata
            .read()
            .await
            .iter()
            .filter(|((owner, _), _)| owner == owner_id)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(Listing::from_records(records, expand))
    }

    async fn read_metadata(&self, owner_id: &str, id: &str) -> Result<Option<FragmentRecord>> {
        Ok(self.metadata.read().await.get(&key(owner_id, id)).cloned())
    }

    async fn write_metadata(&self, record: &FragmentRecord) -> Result<()> {
        self.metadata
            .write()
            .await
            .insert(key(&record.owner_id, &record.id), record.clone());
        Ok(())
    }

    async fn read_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        Ok(self.data.read().await.get(&key(owner_id, id)).cloned())
    }

    async fn write_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        self.data.write().await.insert(key(owner_id, id), data);
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool> {
        // Both locks held: readers never see one half removed.
        // Lock order is always metadata, then data.
        let mut metadata = self.metadata.write().await;
        let mut data = self.data.write().await;
        let k = key(owner_id, id);
        let had_metadata = metadata.remove(&k).is_some();
        let had_data = data.remove(&k).is_some();
        Ok(had_metadata || had_data)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing;

    #[tokio::test]
    async fn test_conformance() {
        let backend = MemoryBackend::new();
        testing::run_backend_conformance_tests(&backend).await.unwrap();
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let backend = MemoryBackend::new();
        let record = testing::test_record("user-1", "shared-id");
        backend.write_metadata(&record).await.unwrap();
        backend
            .write_data("user-1", "shared-id", Bytes::from_static(b"mine"))
            .await
            .unwrap();

        assert!(backend.read_metadata("user-2", "shared-id").await.unwrap().is_none());
        assert!(backend.read_data("user-2", "shared-id").await.unwrap().is_none());
        assert!(backend.list("user-2", false).await.unwrap().is_empty());
    }
}
