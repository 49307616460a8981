//! Durable filesystem storage backend
//!
//! Directory layout:
//! ```text
//! <root>/owners/
//! └── <owner-id>/
//!     ├── metadata/
//!     │   └── <fragment-id>.json   ← FragmentRecord
//!     ├── data/
//!     │   └── <fragment-id>        ← raw bytes
//!     └── trash/                   ← staging area for deletes
//! ```
//!
//! Every write goes to a temp file that is then renamed over the target,
//! so a reader sees either the old or the new contents of a key.

use super::StorageBackend;
use crate::error::{Error, Result};
use crate::fragment::{FragmentRecord, Listing};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem-backed storage
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`, creating the directory if needed
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(root.join("owners"))
            .await
            .map_err(|e| storage_error("create storage root", &root, e))?;
        Ok(Self { root })
    }

    /// Default data directory (~/.fragments/data/)
    pub fn default_dir() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fragments")
            .join("data")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner_id: &str) -> Option<PathBuf> {
        is_safe_segment(owner_id).then(|| self.root.join("owners").join(owner_id))
    }

    fn metadata_path(&self, owner_id: &str, id: &str) -> Option<PathBuf> {
        if !is_safe_segment(id) {
            return None;
        }
        self.owner_dir(owner_id)
            .map(|dir| dir.join("metadata").join(format!("{}.json", id)))
    }

    fn data_path(&self, owner_id: &str, id: &str) -> Option<PathBuf> {
        if !is_safe_segment(id) {
            return None;
        }
        self.owner_dir(owner_id).map(|dir| dir.join("data").join(id))
    }

    /// Write `contents` to `path` via a sibling temp file and rename
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Storage(format!("no parent directory for {}", path.display())))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| storage_error("create directory", dir, e))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("fragment");
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, contents).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error("write", &tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error("rename", path, e));
        }
        Ok(())
    }

    /// Read a file, mapping "not found" to `None`
    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", path, e)),
        }
    }

    /// Move `from` into the trash, returning the trash path if it existed
    async fn move_to_trash(from: &Path, trash: &Path) -> Result<Option<PathBuf>> {
        let name = from.file_name().and_then(|n| n.to_str()).unwrap_or("fragment");
        let target = trash.join(format!("{}.{}", uuid::Uuid::new_v4(), name));
        match tokio::fs::rename(from, &target).await {
            Ok(()) => Ok(Some(target)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("move to trash", from, e)),
        }
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn list(&self, owner_id: &str, expand: bool) -> Result<Listing> {
        let Some(owner_dir) = self.owner_dir(owner_id) else {
            return Ok(Listing::from_records(Vec::new(), expand));
        };
        let dir = owner_dir.join("metadata");

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Listing::from_records(Vec::new(), expand));
            }
            Err(e) => return Err(storage_error("list", &dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list", &dir, e))?
        {
            let path = entry.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            // None: deleted between read_dir and read
            if let Some(raw) = Self::read_optional(&path).await? {
                records.push(parse_record(&path, &raw)?);
            }
        }

        Ok(Listing::from_records(records, expand))
    }

    async fn read_metadata(&self, owner_id: &str, id: &str) -> Result<Option<FragmentRecord>> {
        let Some(path) = self.metadata_path(owner_id, id) else {
            return Ok(None);
        };
        match Self::read_optional(&path).await? {
            Some(raw) => parse_record(&path, &raw).map(Some),
            None => Ok(None),
        }
    }

    async fn write_metadata(&self, record: &FragmentRecord) -> Result<()> {
        let path = self
            .metadata_path(&record.owner_id, &record.id)
            .ok_or_else(|| invalid_key(&record.owner_id, &record.id))?;
        let json = serde_json::to_vec_pretty(record)?;
        Self::write_atomic(&path, &json).await
    }

    async fn read_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        let Some(path) = self.data_path(owner_id, id) else {
            return Ok(None);
        };
        Ok(Self::read_optional(&path).await?.map(Bytes::from))
    }

    async fn write_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        let path = self
            .data_path(owner_id, id)
            .ok_or_else(|| invalid_key(owner_id, id))?;
        Self::write_atomic(&path, &data).await
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool> {
        let (Some(owner_dir), Some(metadata), Some(data)) = (
            self.owner_dir(owner_id),
            self.metadata_path(owner_id, id),
            self.data_path(owner_id, id),
        ) else {
            return Ok(false);
        };

        let trash = owner_dir.join("trash");
        tokio::fs::create_dir_all(&trash)
            .await
            .map_err(|e| storage_error("create directory", &trash, e))?;

        // Stage both files out of their namespaces before removing anything,
        // so a failure leaves the fragment whole.
        let trashed_metadata = Self::move_to_trash(&metadata, &trash).await?;
        let trashed_data = match Self::move_to_trash(&data, &trash).await {
            Ok(moved) => moved,
            Err(e) => {
                if let Some(staged) = &trashed_metadata {
                    if let Err(restore) = tokio::fs::rename(staged, &metadata).await {
                        tracing::error!(
                            owner = owner_id,
                            id,
                            "Failed to restore metadata after aborted delete: {}",
                            restore
                        );
                    }
                }
                return Err(e);
            }
        };

        for staged in trashed_metadata.iter().chain(trashed_data.iter()) {
            if let Err(e) = tokio::fs::remove_file(staged).await {
                tracing::warn!("Failed to purge {}: {}", staged.display(), e);
            }
        }

        Ok(trashed_metadata.is_some() || trashed_data.is_some())
    }

    fn name(&self) -> &str {
        "fs"
    }
}

/// A path segment that cannot escape its parent directory
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn parse_record(path: &Path, raw: &[u8]) -> Result<FragmentRecord> {
    serde_json::from_slice(raw).map_err(|e| {
        tracing::error!("Corrupt fragment record {}: {}", path.display(), e);
        Error::Storage(format!("corrupt fragment record {}: {}", path.display(), e))
    })
}

fn invalid_key(owner_id: &str, id: &str) -> Error {
    Error::Storage(format!("invalid storage key: {}/{}", owner_id, id))
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("failed to {} {}: {}", action, path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing;
    use tempfile::TempDir;

    async fn make_backend() -> (FsBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path().to_path_buf()).await.unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn test_conformance() {
        let (backend, _dir) = make_backend().await;
        testing::run_backend_conformance_tests(&backend).await.unwrap();
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let record = testing::test_record("owner-a", "kept");

        {
            let backend = FsBackend::new(dir.path().to_path_buf()).await.unwrap();
            backend.write_metadata(&record).await.unwrap();
            backend
                .write_data("owner-a", "kept", Bytes::from_static(b"survives"))
                .await
                .unwrap();
        }

        let backend = FsBackend::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(
            backend.read_metadata("owner-a", "kept").await.unwrap(),
            Some(record)
        );
        assert_eq!(
            backend.read_data("owner-a", "kept").await.unwrap().as_deref(),
            Some(&b"survives"[..])
        );
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let (backend, dir) = make_backend().await;
        backend
            .write_metadata(&testing::test_record("owner-a", "frag"))
            .await
            .unwrap();
        backend
            .write_data("owner-a", "frag", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let owner = dir.path().join("owners").join("owner-a");
        assert!(owner.join("metadata").join("frag.json").exists());
        assert!(owner.join("data").join("frag").exists());
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (backend, _dir) = make_backend().await;
        assert!(backend.read_data("..", "x").await.unwrap().is_none());
        assert!(backend.read_metadata("owner", "../x").await.unwrap().is_none());
        assert!(backend.list("../..", false).await.unwrap().is_empty());
        assert!(backend
            .write_data("owner", "../escape", Bytes::from_static(b"x"))
            .await
            .is_err());
        assert!(!backend.delete("owner", "..").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_fails_on_corrupt_record() {
        let (backend, dir) = make_backend().await;
        backend
            .write_metadata(&testing::test_record("owner-a", "good"))
            .await
            .unwrap();
        let bad = dir
            .path()
            .join("owners")
            .join("owner-a")
            .join("metadata")
            .join("bad.json");
        std::fs::write(bad, "not json").unwrap();

        let err = backend.list("owner-a", false).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        let err = backend.list("owner-a", true).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(matches!(
            backend.read_metadata("owner-a", "bad").await.unwrap_err(),
            Error::Storage(_)
        ));
        assert!(backend.read_metadata("owner-a", "good").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_data_move_restores_metadata() {
        let (backend, dir) = make_backend().await;
        let record = testing::test_record("owner-a", "stuck");
        backend.write_metadata(&record).await.unwrap();

        // A plain file where the data directory should be makes the data
        // rename fail after the metadata has already been moved to trash.
        let owner = dir.path().join("owners").join("owner-a");
        std::fs::write(owner.join("data"), "not a directory").unwrap();

        let err = backend.delete("owner-a", "stuck").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        assert_eq!(
            backend.read_metadata("owner-a", "stuck").await.unwrap(),
            Some(record)
        );
        assert_eq!(backend.list("owner-a", false).await.unwrap().ids(), vec!["stuck"]);
        assert_eq!(std::fs::read_dir(owner.join("trash")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_delete_leaves_trash_empty() {
        let (backend, dir) = make_backend().await;
        backend
            .write_metadata(&testing::test_record("owner-a", "gone"))
            .await
            .unwrap();
        backend
            .write_data("owner-a", "gone", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert!(backend.delete("owner-a", "gone").await.unwrap());
        let trash = dir.path().join("owners").join("owner-a").join("trash");
        assert_eq!(std::fs::read_dir(trash).unwrap().count(), 0);
    }
}
