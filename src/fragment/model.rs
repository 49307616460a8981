//! The fragment entity
//!
//! A [`Fragment`] is a validated metadata record plus the operations that
//! keep it consistent with its payload in a [`FragmentStore`].

use super::types::{FragmentRecord, Listing};
use crate::convert;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::storage::FragmentStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One owner-scoped, typed unit of stored content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    record: FragmentRecord,
    format: Format,
}

impl Fragment {
    /// Create a new, empty fragment with a fresh id.
    ///
    /// Nothing is written to storage until [`Fragment::set_data`] or
    /// [`Fragment::save`] is called.
    pub fn new(owner_id: impl Into<String>, content_type: impl Into<String>) -> Result<Self> {
        Self::with_id(uuid::Uuid::new_v4().to_string(), owner_id, content_type)
    }

    /// Create a new, empty fragment with a caller-chosen id
    pub fn with_id(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Result<Self> {
        let now = Utc::now();
        Self::from_record(FragmentRecord {
            id: id.into(),
            owner_id: owner_id.into(),
            created: now,
            updated: now,
            content_type: content_type.into(),
            size: 0,
        })
    }

    /// Validate an existing metadata record
    pub fn from_record(record: FragmentRecord) -> Result<Self> {
        if record.owner_id.trim().is_empty() {
            return Err(Error::validation("ownerId", "ownerId is required"));
        }
        if record.id.trim().is_empty() {
            return Err(Error::validation("id", "id is required"));
        }
        if record.content_type.trim().is_empty() {
            return Err(Error::validation("type", "type is required"));
        }
        let format = Format::from_media_type(&record.content_type).ok_or_else(|| {
            Error::validation("type", format!("Unsupported type: {}", record.content_type))
        })?;
        Ok(Self { record, format })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn owner_id(&self) -> &str {
        &self.record.owner_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.record.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.record.updated
    }

    /// Full declared type, parameters included
    pub fn content_type(&self) -> &str {
        &self.record.content_type
    }

    pub fn size(&self) -> u64 {
        self.record.size
    }

    pub fn record(&self) -> &FragmentRecord {
        &self.record
    }

    pub fn into_record(self) -> FragmentRecord {
        self.record
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Base media type, e.g. `text/html` for `text/html; charset=utf-8`
    pub fn mime_type(&self) -> &'static str {
        self.format.media_type()
    }

    /// True if this fragment is a `text/*` type
    pub fn is_text(&self) -> bool {
        self.mime_type().starts_with("text/")
    }

    /// Formats this fragment can be converted to
    pub fn formats(&self) -> &'static [Format] {
        self.format.targets()
    }

    // =========================================================================
    // Storage operations
    // =========================================================================

    /// List a user's fragments: ids, or full records when `expand` is set
    pub async fn by_user(store: &FragmentStore, owner_id: &str, expand: bool) -> Result<Listing> {
        tracing::debug!(owner = owner_id, expand, "Listing fragments");
        store.backend().list(owner_id, expand).await
    }

    /// Load one fragment's metadata
    pub async fn by_id(store: &FragmentStore, owner_id: &str, id: &str) -> Result<Self> {
        let record = store
            .backend()
            .read_metadata(owner_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Fragment {} not found", id)))?;
        Self::from_record(record).map_err(|e| {
            Error::Storage(format!("stored fragment {} is invalid: {}", id, e))
        })
    }

    /// Remove a fragment's metadata and data together
    pub async fn delete(store: &FragmentStore, owner_id: &str, id: &str) -> Result<()> {
        let _guard = store.lock(owner_id, id).await;
        if !store.backend().delete(owner_id, id).await? {
            return Err(Error::NotFound(format!("Fragment {} not found", id)));
        }
        tracing::info!(owner = owner_id, id, "Fragment deleted");
        Ok(())
    }

    /// Persist the current metadata, stamping `updated` first
    pub async fn save(&mut self, store: &FragmentStore) -> Result<()> {
        let _guard = store.lock(self.owner_id(), self.id()).await;
        let mut next = self.record.clone();
        next.updated = stamp(self.record.updated);
        store.backend().write_metadata(&next).await?;
        self.record = next;
        Ok(())
    }

    /// Load the raw payload
    pub async fn get_data(&self, store: &FragmentStore) -> Result<Bytes> {
        store
            .backend()
            .read_data(self.owner_id(), self.id())
            .await?
            .ok_or_else(|| {
                tracing::error!(
                    owner = self.owner_id(),
                    id = self.id(),
                    "Fragment metadata has no data"
                );
                Error::NotFound(format!("Fragment {} has no data", self.id()))
            })
    }

    /// Replace the payload, then persist metadata with the new size.
    ///
    /// Either both writes land or the fragment is left as it was: a failed
    /// metadata write restores the previous payload.
    pub async fn set_data(&mut self, store: &FragmentStore, data: Bytes) -> Result<()> {
        let _guard = store.lock(self.owner_id(), self.id()).await;
        let backend = store.backend();

        let previous = backend.read_data(self.owner_id(), self.id()).await?;

        let mut next = self.record.clone();
        next.updated = stamp(self.record.updated);
        next.size = data.len() as u64;

        backend.write_data(self.owner_id(), self.id(), data).await?;

        if let Err(e) = backend.write_metadata(&next).await {
            tracing::error!(
                owner = self.owner_id(),
                id = self.id(),
                "Metadata write failed, rolling back data: {}",
                e
            );
            let rollback = match previous {
                Some(bytes) => backend.write_data(self.owner_id(), self.id(), bytes).await,
                None => backend.delete(self.owner_id(), self.id()).await.map(|_| ()),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(
                    owner = self.owner_id(),
                    id = self.id(),
                    "Rollback failed: {}",
                    rollback_err
                );
            }
            return Err(e);
        }

        self.record = next;
        tracing::debug!(
            owner = self.owner_id(),
            id = self.id(),
            size = self.size(),
            "Fragment data written"
        );
        Ok(())
    }

    /// Load the payload converted to `target`
    pub async fn data_as(&self, store: &FragmentStore, target: Format) -> Result<Bytes> {
        let data = self.get_data(store).await?;
        convert::convert_async(data, self.format, target).await
    }
}

/// Timestamp for a mutation, never earlier than the previous one
fn stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}
