//! Tests for the in-memory record store

use serde_json::json;
use shared::{RecordId, StoreError};

use super::common::{article, fields, with_timeout};
use crate::services::MemoryStore;
use crate::traits::RecordStore;

#[tokio::test]
async fn test_create_appends_in_creation_order() {
    let store = MemoryStore::new("Archive");

    let first = store.create_record(fields(json!({"Title": "One"}))).await.unwrap();
    let second = store.create_record(fields(json!({"Title": "Two"}))).await.unwrap();

    let listed = store.list_records().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first);
    assert_eq!(listed[1].id, second);
    assert!(listed[0].created_at.is_some());
    assert_eq!(store.create_calls().await, 2);
}

#[tokio::test]
async fn test_clones_share_one_table() {
    let store = MemoryStore::new("Editorial");
    let handle = store.clone();

    store.seed(vec![article("r1", "A", 2010)]).await;
    assert_eq!(handle.len().await, 1);
    assert!(handle.contains(&RecordId::new("r1")).await);
}

#[tokio::test]
async fn test_injected_title_failure() {
    let store = MemoryStore::new("Archive");
    store.fail_on_title("Broken").await;

    let err = store
        .create_record(fields(json!({"Title": "Broken"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CreateFailed { .. }));
    assert!(store.is_empty().await);
    assert_eq!(store.create_calls().await, 1);
}

#[tokio::test]
async fn test_delete_reports_per_id_outcomes() {
    let store = MemoryStore::with_records(
        "Editorial",
        vec![article("r1", "A", 2010), article("r2", "B", 2011), article("r3", "C", 2012)],
    );
    store.fail_delete_for(RecordId::new("r2")).await;

    let outcomes = store
        .delete_records(&[RecordId::new("r1"), RecordId::new("r2"), RecordId::new("missing")])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].1.is_ok());
    assert!(matches!(outcomes[1].1, Err(StoreError::DeleteFailed { .. })));
    assert!(matches!(outcomes[2].1, Err(StoreError::NotFound { .. })));

    let remaining: Vec<_> = store.records().await.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![RecordId::new("r2"), RecordId::new("r3")]);
    assert_eq!(store.delete_batches().await, vec![3]);
}

#[tokio::test]
async fn test_oversized_batch_rejected() {
    let store = MemoryStore::new("Editorial").with_max_batch_size(2);
    let ids: Vec<_> = ["a", "b", "c"].into_iter().map(RecordId::new).collect();

    let err = store.delete_records(&ids).await.unwrap_err();
    assert_eq!(err, StoreError::BatchTooLarge { size: 3, max: 2 });
    assert!(store.delete_batches().await.is_empty());
}

#[tokio::test]
async fn test_unavailable_store_fails_every_call() {
    let store = MemoryStore::with_records("Editorial", vec![article("r1", "A", 2010)]);
    store.set_unavailable(true).await;

    assert!(matches!(store.list_records().await, Err(StoreError::Unavailable { .. })));
    assert!(store.create_record(fields(json!({}))).await.is_err());
    assert!(store.delete_records(&[RecordId::new("r1")]).await.is_err());

    store.set_unavailable(false).await;
    let listed = with_timeout(store.list_records()).await.unwrap().unwrap();
    assert_eq!(listed.len(), 1);
}
