//! Tests for the upload coordinator.
//!
//! Pre-signing is a local signature computation, so everything here runs
//! without an object storage endpoint; only `ensure_bucket` (not tested
//! here) talks to the network.

use libris::catalog::Catalog;
use libris::config::StorageConfig;
use libris::error::{CatalogError, UploadError};
use libris::model::NewBook;
use libris::store::BookStore;
use libris::uploads::{UploadCoordinator, object_key};
use tempfile::TempDir;

fn test_coordinator(dir: &TempDir) -> (Catalog, UploadCoordinator) {
    let store = BookStore::open(dir.path().join("catalog.db")).unwrap();
    let catalog = Catalog::new(store.clone());
    let uploads = UploadCoordinator::new(catalog.clone(), store, StorageConfig::default());
    (catalog, uploads)
}

async fn seed_book(catalog: &Catalog) -> i64 {
    catalog
        .add_book(NewBook {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn slot_for_unknown_book_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (_, uploads) = test_coordinator(&dir);

    let err = uploads
        .request_slot(42, "cover.jpg", "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadError::Catalog(CatalogError::BookNotFound { id: 42 })
    ));
}

#[tokio::test]
async fn slot_carries_presigned_put_details() {
    let dir = TempDir::new().unwrap();
    let (catalog, uploads) = test_coordinator(&dir);
    let book_id = seed_book(&catalog).await;

    let slot = uploads
        .request_slot(book_id, "cover.jpg", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(slot.method, "PUT");
    assert_eq!(slot.object_name, object_key(book_id, "cover.jpg"));
    assert_eq!(slot.content_type, "image/jpeg");
    assert_eq!(slot.expires_in_secs, 300);

    // Path-style URL against the configured endpoint, carrying the signature.
    assert!(slot.upload_url.contains("library-files"));
    assert!(slot.upload_url.contains(&slot.object_name));
    assert!(slot.upload_url.contains("X-Amz-Signature"));
    assert!(slot.upload_url.contains("X-Amz-Expires=300"));
}

#[tokio::test]
async fn repeated_slot_requests_reuse_the_same_key() {
    let dir = TempDir::new().unwrap();
    let (catalog, uploads) = test_coordinator(&dir);
    let book_id = seed_book(&catalog).await;

    let first = uploads
        .request_slot(book_id, "dune.epub", "application/epub+zip")
        .await
        .unwrap();
    let second = uploads
        .request_slot(book_id, "dune.epub", "application/epub+zip")
        .await
        .unwrap();

    assert_eq!(first.object_name, second.object_name);
}

#[tokio::test]
async fn register_then_attachments_roundtrip() {
    let dir = TempDir::new().unwrap();
    let (catalog, uploads) = test_coordinator(&dir);
    let book_id = seed_book(&catalog).await;

    let key = object_key(book_id, "dune.epub");
    let record = uploads
        .register_upload(book_id, "dune.epub", &key)
        .await
        .unwrap();
    assert_eq!(record.book_id, book_id);
    assert_eq!(record.filename, "dune.epub");
    assert_eq!(record.object_name, key);

    let files = uploads.attachments(book_id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], record);
}

#[tokio::test]
async fn register_for_unknown_book_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (_, uploads) = test_coordinator(&dir);

    let err = uploads
        .register_upload(42, "cover.jpg", "books/42/cover.jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Catalog(_)));
}

#[tokio::test]
async fn attachments_for_unknown_book_are_empty() {
    let dir = TempDir::new().unwrap();
    let (_, uploads) = test_coordinator(&dir);

    assert!(uploads.attachments(42).await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_a_book_empties_its_attachments() {
    let dir = TempDir::new().unwrap();
    let (catalog, uploads) = test_coordinator(&dir);
    let book_id = seed_book(&catalog).await;

    let key = object_key(book_id, "cover.jpg");
    uploads
        .register_upload(book_id, "cover.jpg", &key)
        .await
        .unwrap();

    catalog.remove_book(book_id).await.unwrap();
    assert!(uploads.attachments(book_id).await.unwrap().is_empty());
}
