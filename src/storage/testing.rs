use bytes::Bytes;
use chrono::{Duration, Utc};

use super::StorageBackend;
use crate::error::Result;
use crate::fragment::{FragmentRecord, Listing};

const OWNER: &str = "conformance-owner";

pub(crate) fn test_record(owner_id: &str, id: &str) -> FragmentRecord {
    let now = Utc::now();
    FragmentRecord {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        created: now,
        updated: now,
        content_type: "text/plain".to_string(),
        size: 0,
    }
}

/// Run the full backend conformance test suite.
///
/// Call this from a backend's test module with a fresh, empty backend.
pub(crate) async fn run_backend_conformance_tests(backend: &dyn StorageBackend) -> Result<()> {
    test_list_empty(backend).await?;
    test_read_missing(backend).await?;
    test_metadata_round_trip(backend).await?;
    test_data_round_trip(backend).await?;
    test_last_write_wins(backend).await?;
    test_list_expand(backend).await?;
    test_delete_removes_both(backend).await?;
    test_delete_missing(backend).await?;
    Ok(())
}

async fn test_list_empty(backend: &dyn StorageBackend) -> Result<()> {
    let listing = backend.list("nobody", false).await?;
    assert_eq!(listing, Listing::Ids(Vec::new()), "unknown owner lists empty");
    let expanded = backend.list("nobody", true).await?;
    assert_eq!(expanded, Listing::Records(Vec::new()));
    Ok(())
}

async fn test_read_missing(backend: &dyn StorageBackend) -> Result<()> {
    assert!(backend.read_metadata(OWNER, "missing").await?.is_none());
    assert!(backend.read_data(OWNER, "missing").await?.is_none());
    Ok(())
}

async fn test_metadata_round_trip(backend: &dyn StorageBackend) -> Result<()> {
    let record = test_record(OWNER, "meta");
    backend.write_metadata(&record).await?;
    let stored = backend.read_metadata(OWNER, "meta").await?;
    assert_eq!(stored.as_ref(), Some(&record));
    backend.delete(OWNER, "meta").await?;
    Ok(())
}

async fn test_data_round_trip(backend: &dyn StorageBackend) -> Result<()> {
    let payload = Bytes::from_static(b"\x00\x01binary\xffpayload");
    backend.write_data(OWNER, "data", payload.clone()).await?;
    assert_eq!(backend.read_data(OWNER, "data").await?, Some(payload));

    backend.write_data(OWNER, "empty", Bytes::new()).await?;
    assert_eq!(
        backend.read_data(OWNER, "empty").await?,
        Some(Bytes::new()),
        "empty payload is present, not absent"
    );

    backend.delete(OWNER, "data").await?;
    backend.delete(OWNER, "empty").await?;
    Ok(())
}

async fn test_last_write_wins(backend: &dyn StorageBackend) -> Result<()> {
    backend.write_data(OWNER, "lww", Bytes::from_static(b"first")).await?;
    backend.write_data(OWNER, "lww", Bytes::from_static(b"second")).await?;
    assert_eq!(
        backend.read_data(OWNER, "lww").await?.as_deref(),
        Some(&b"second"[..])
    );

    let mut record = test_record(OWNER, "lww");
    backend.write_metadata(&record).await?;
    record.size = 6;
    backend.write_metadata(&record).await?;
    let stored = backend.read_metadata(OWNER, "lww").await?;
    assert_eq!(stored.map(|r| r.size), Some(6));

    backend.delete(OWNER, "lww").await?;
    Ok(())
}

async fn test_list_expand(backend: &dyn StorageBackend) -> Result<()> {
    let owner = "list-owner";
    let mut first = test_record(owner, "first");
    first.created -= Duration::seconds(10);
    let second = test_record(owner, "second");
    backend.write_metadata(&second).await?;
    backend.write_metadata(&first).await?;
    backend.write_metadata(&test_record("someone-else", "foreign")).await?;

    let ids = backend.list(owner, false).await?;
    assert_eq!(ids, Listing::Ids(vec!["first".into(), "second".into()]));

    match backend.list(owner, true).await? {
        Listing::Records(records) => {
            assert_eq!(records.len(), 2);
            assert_eq!(records[0], first);
            assert_eq!(records[1], second);
        }
        other => panic!("expected records, got {:?}", other),
    }

    backend.delete(owner, "first").await?;
    backend.delete(owner, "second").await?;
    backend.delete("someone-else", "foreign").await?;
    Ok(())
}

async fn test_delete_removes_both(backend: &dyn StorageBackend) -> Result<()> {
    backend.write_metadata(&test_record(OWNER, "doomed")).await?;
    backend.write_data(OWNER, "doomed", Bytes::from_static(b"bye")).await?;

    let existed = backend.delete(OWNER, "doomed").await?;
    assert!(existed, "delete should report an existing fragment");
    assert!(backend.read_metadata(OWNER, "doomed").await?.is_none());
    assert!(backend.read_data(OWNER, "doomed").await?.is_none());
    assert!(!backend.list(OWNER, false).await?.ids().contains(&"doomed"));
    Ok(())
}

async fn test_delete_missing(backend: &dyn StorageBackend) -> Result<()> {
    let existed = backend.delete(OWNER, "never-existed").await?;
    assert!(!existed, "delete on missing key should return false");
    Ok(())
}
