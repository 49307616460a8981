//! Pluggable fragment storage
//!
//! Defines the [`StorageBackend`] trait, the contract every backend
//! implements, and [`FragmentStore`], the shared handle the fragment model
//! and HTTP handlers work through.
//!
//! ## Contract
//!
//! - Metadata and data live in two namespaces, both keyed by
//!   (owner id, fragment id).
//! - Writes are last-write-wins per key; a read observes the latest
//!   completed write for its key.
//! - `delete` removes metadata and data as a unit.
//! - A missing key is `Ok(None)`, never an error.

pub mod fs;
pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

pub use fs::FsBackend;
pub use memory::MemoryBackend;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::error::Result;
use crate::fragment::{FragmentRecord, Listing};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Storage backend interface.
///
/// Implementations may be volatile or durable; callers cannot tell them
/// apart.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List an owner's fragments, ids only unless `expand` is set
    async fn list(&self, owner_id: &str, expand: bool) -> Result<Listing>;

    async fn read_metadata(&self, owner_id: &str, id: &str) -> Result<Option<FragmentRecord>>;

    async fn write_metadata(&self, record: &FragmentRecord) -> Result<()>;

    async fn read_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>>;

    async fn write_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()>;

    /// Remove metadata and data together. Returns `true` if either existed.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool>;

    /// Human-readable backend name (used in logs)
    fn name(&self) -> &str;
}

type KeyLock = Arc<Mutex<()>>;

/// Shared storage handle: a backend plus per-key write serialization
#[derive(Clone)]
pub struct FragmentStore {
    backend: Arc<dyn StorageBackend>,
    locks: Arc<Mutex<HashMap<(String, String), KeyLock>>>,
}

impl FragmentStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Volatile store, mostly for tests
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Open the backend selected by configuration
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match config.backend {
            StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
            StorageBackendKind::Fs => Arc::new(FsBackend::new(config.data_dir.clone()).await?),
        };
        tracing::info!(backend = backend.name(), "Opened fragment storage");
        Ok(Self::new(backend))
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Acquire the write lock for one (owner, id) key.
    ///
    /// Composite mutations hold this for their whole duration so two writers
    /// on the same fragment never interleave.
    pub async fn lock(&self, owner_id: &str, id: &str) -> OwnedMutexGuard<()> {
        let key_lock = {
            let mut locks = self.locks.lock().await;
            // Drop locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((owner_id.to_string(), id.to_string()))
                .or_default()
                .clone()
        };
        key_lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_serializes_same_key() {
        let store = FragmentStore::memory();
        let guard = store.lock("owner", "a").await;

        let contender = store.clone();
        let handle = tokio::spawn(async move {
            let _guard = contender.lock("owner", "a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_independent_keys() {
        let store = FragmentStore::memory();
        let _a = store.lock("owner", "a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), store.lock("owner", "b")).await;
        assert!(b.is_ok());
        let other_owner =
            tokio::time::timeout(Duration::from_secs(1), store.lock("other", "a")).await;
        assert!(other_owner.is_ok());
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = StorageConfig::default();
        let store = FragmentStore::open(&config).await.unwrap();
        assert_eq!(store.backend().name(), "memory");
    }
}
