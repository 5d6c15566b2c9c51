//! Upload coordination: pre-signed PUT URLs plus file-reference records.
//!
//! The coordinator never touches file bytes. It issues time-limited write
//! URLs against S3-compatible storage and, as a separate explicit step,
//! records the resulting object reference against a book. A slot that is
//! never followed by a registration leaves no trace and is harmless to
//! retry.

use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};

use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::{UploadError, UploadResult};
use crate::model::{FileRecord, UploadSlot};
use crate::store::BookStore;

/// Derive the object key for a book attachment.
///
/// The key is deterministic: repeated uploads of the same filename under
/// the same book land on the same object, intentionally allowing
/// overwrite-by-re-upload.
pub fn object_key(book_id: i64, filename: &str) -> String {
    format!("books/{book_id}/{filename}")
}

/// Bridges book records to externally stored binary files.
#[derive(Clone)]
pub struct UploadCoordinator {
    catalog: Catalog,
    store: BookStore,
    client: aws_sdk_s3::Client,
    storage: StorageConfig,
}

impl UploadCoordinator {
    /// Build a coordinator against the configured endpoint.
    ///
    /// The client uses static credentials and path-style addressing, which
    /// is what MinIO and other self-hosted S3 implementations expect.
    pub fn new(catalog: Catalog, store: BookStore, storage: StorageConfig) -> Self {
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .endpoint_url(&storage.endpoint)
            .credentials_provider(Credentials::new(
                &storage.access_key,
                &storage.secret_key,
                None,
                None,
                "libris-config",
            ))
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(conf);

        Self {
            catalog,
            store,
            client,
            storage,
        }
    }

    /// The bucket attachments are uploaded to.
    pub fn bucket(&self) -> &str {
        &self.storage.bucket
    }

    /// Probe the configured bucket and create it if missing.
    ///
    /// Called once at server startup. Failure here does not stop the
    /// catalog routes from serving; upload routes then fail per-request.
    pub async fn ensure_bucket(&self) -> UploadResult<()> {
        let bucket = &self.storage.bucket;
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::debug!(bucket, "bucket exists");
                Ok(())
            }
            Err(err) => {
                if !err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Err(UploadError::Bucket {
                        bucket: bucket.clone(),
                        message: err.to_string(),
                    });
                }
                let constraint = BucketLocationConstraint::from(self.storage.region.as_str());
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .create_bucket_configuration(
                        CreateBucketConfiguration::builder()
                            .location_constraint(constraint)
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| UploadError::Bucket {
                        bucket: bucket.clone(),
                        message: e.to_string(),
                    })?;
                tracing::info!(bucket, "created bucket");
                Ok(())
            }
        }
    }

    /// Issue a time-limited pre-signed PUT slot for a book attachment.
    ///
    /// Fails with not-found before contacting object storage when the book
    /// does not exist. Issuing a slot creates no file record.
    pub async fn request_slot(
        &self,
        book_id: i64,
        filename: &str,
        content_type: &str,
    ) -> UploadResult<UploadSlot> {
        self.catalog.view_book(book_id).await?;

        let key = object_key(book_id, filename);
        let expires_in = Duration::from_secs(self.storage.url_expiry_secs);
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| {
            UploadError::Presign {
                key: key.clone(),
                message: e.to_string(),
            }
        })?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.storage.bucket)
            .key(&key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| UploadError::Presign {
                key: key.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(book_id, key = %key, "issued upload slot");
        Ok(UploadSlot {
            upload_url: presigned.uri().to_string(),
            object_name: key,
            method: "PUT".into(),
            content_type: content_type.to_string(),
            expires_in_secs: self.storage.url_expiry_secs,
        })
    }

    /// Persist the reference to an uploaded object. The second phase of the
    /// two-phase upload flow; fails with not-found for unknown books.
    pub async fn register_upload(
        &self,
        book_id: i64,
        filename: &str,
        object_name: &str,
    ) -> UploadResult<FileRecord> {
        self.catalog.view_book(book_id).await?;

        let record = self.store.create_file(book_id, filename, object_name).await?;
        tracing::debug!(book_id, filename, "registered uploaded file");
        Ok(record)
    }

    /// Files attached to a book. No existence check; unknown books yield
    /// an empty list, mirroring the store.
    pub async fn attachments(&self, book_id: i64) -> UploadResult<Vec<FileRecord>> {
        Ok(self.store.files_for_book(book_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_deterministic_and_namespaced() {
        assert_eq!(object_key(7, "cover.jpg"), "books/7/cover.jpg");
        assert_eq!(object_key(7, "cover.jpg"), object_key(7, "cover.jpg"));
        assert_ne!(object_key(7, "cover.jpg"), object_key(8, "cover.jpg"));
    }
}
