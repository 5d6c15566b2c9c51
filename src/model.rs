//! Core data types for the book catalog.
//!
//! These structs are shared between the store, the CLI, and the HTTP API;
//! JSON field names are camelCase on the wire and timestamps serialize as
//! RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted book record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned id, never reused after deletion.
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Unique across the catalog when present.
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful update.
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a book. `title` and `author` are mandatory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub genre: Option<String>,
}

/// A partial update to a book. Absent fields retain their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl BookPatch {
    /// True when no field is supplied. An empty patch still refreshes
    /// `updatedAt` when applied.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.published_year.is_none()
            && self.genre.is_none()
    }
}

/// Metadata for a file attached to a book. The bytes live in object storage;
/// only the reference is persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub book_id: i64,
    /// Display name as uploaded.
    pub filename: String,
    /// Storage-layer key, `books/{bookId}/{filename}`.
    pub object_name: String,
    pub created_at: DateTime<Utc>,
}

/// One genre's share of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreCount {
    /// Genre label, `"Unknown"` for books without one.
    pub genre: String,
    pub count: usize,
}

/// Catalog-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: usize,
    /// Sorted by count descending, ties in first-encountered order.
    pub genres: Vec<GenreCount>,
}

/// A time-limited pre-signed upload slot.
///
/// Issuing a slot creates no file record; the caller PUTs the bytes to
/// `upload_url` and then registers the upload explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub upload_url: String,
    /// The derived object key, stable for a given (book, filename) pair.
    pub object_name: String,
    /// HTTP method the caller must use (`PUT`).
    pub method: String,
    /// Content-Type header the caller must send.
    pub content_type: String,
    pub expires_in_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_serializes_camel_case() {
        let book = Book {
            id: 1,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: None,
            published_year: Some(1965),
            genre: Some("Sci-Fi".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&book).unwrap();
        assert!(json.contains("\"publishedYear\":1965"));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("published_year"));
    }

    #[test]
    fn patch_skips_absent_fields() {
        let patch = BookPatch {
            genre: Some("Fantasy".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, "{\"genre\":\"Fantasy\"}");
        assert!(!patch.is_empty());
        assert!(BookPatch::default().is_empty());
    }

    #[test]
    fn patch_deserializes_partial_body() {
        let patch: BookPatch =
            serde_json::from_str("{\"title\":\"New\",\"publishedYear\":2001}").unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.published_year, Some(2001));
        assert!(patch.author.is_none());
    }

    #[test]
    fn file_record_uses_camel_case_keys() {
        let record = FileRecord {
            id: 3,
            book_id: 9,
            filename: "cover.jpg".into(),
            object_name: "books/9/cover.jpg".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"bookId\":9"));
        assert!(json.contains("\"objectName\":\"books/9/cover.jpg\""));
    }
}
