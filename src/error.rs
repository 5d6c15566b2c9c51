//! Rich diagnostic error types for libris.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong and
//! how to fix it. Absence of a record is modelled as data (`Option` / a dedicated
//! not-found variant), never as a panic.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for libris.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum LibrisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] crate::paths::PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] crate::client::ClientError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to open database at {path}")]
    #[diagnostic(
        code(libris::store::open),
        help(
            "Check that the parent directory exists, has correct permissions, \
             and that the file is a SQLite database (or absent, in which case \
             it will be created)."
        )
    )]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("a book with ISBN {isbn} already exists")]
    #[diagnostic(
        code(libris::store::duplicate_isbn),
        help("ISBNs are unique across the catalog. Look the existing book up with `libris search`.")
    )]
    DuplicateIsbn { isbn: String },

    #[error("book {book_id} does not exist")]
    #[diagnostic(
        code(libris::store::missing_book),
        help("The file references a book id that is not in the catalog. Verify the id with `libris list`.")
    )]
    MissingBook { book_id: i64 },

    #[error("database query failed: {source}")]
    #[diagnostic(
        code(libris::store::sqlite),
        help(
            "The underlying SQLite call failed. This may indicate a corrupt \
             database file or a full disk. If the problem persists, inspect \
             the file with the sqlite3 shell."
        )
    )]
    Sqlite {
        #[source]
        source: rusqlite::Error,
    },
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("{field} is required and cannot be empty")]
    #[diagnostic(
        code(libris::catalog::validation),
        help("Provide a non-empty value. Title and author are mandatory for every book.")
    )]
    Validation { field: &'static str },

    #[error("book not found: {id}")]
    #[diagnostic(
        code(libris::catalog::not_found),
        help("No book with this id exists. List ids with `libris list`.")
    )]
    BookNotFound { id: i64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Upload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum UploadError {
    #[error("failed to pre-sign upload URL for {key}: {message}")]
    #[diagnostic(
        code(libris::upload::presign),
        help(
            "The object storage client rejected the pre-sign request. \
             Check the endpoint, credentials, and url_expiry_secs in the \
             storage configuration."
        )
    )]
    Presign { key: String, message: String },

    #[error("bucket \"{bucket}\" is not usable: {message}")]
    #[diagnostic(
        code(libris::upload::bucket),
        help(
            "The bucket could not be probed or created. Verify the storage \
             endpoint is reachable and the credentials allow bucket operations."
        )
    )]
    Bucket { bucket: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for functions returning libris results.
pub type LibrisResult<T> = std::result::Result<T, LibrisError>;

/// Alias for store-layer results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Alias for catalog-layer results.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Alias for upload-coordinator results.
pub type UploadResult<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_libris_error() {
        let err = StoreError::DuplicateIsbn {
            isbn: "978-0-13-468599-1".into(),
        };
        let top: LibrisError = err.into();
        assert!(matches!(
            top,
            LibrisError::Store(StoreError::DuplicateIsbn { .. })
        ));
    }

    #[test]
    fn catalog_error_wraps_store_error() {
        let err = StoreError::MissingBook { book_id: 42 };
        let catalog: CatalogError = err.into();
        assert!(matches!(
            catalog,
            CatalogError::Store(StoreError::MissingBook { book_id: 42 })
        ));
    }

    #[test]
    fn upload_error_wraps_catalog_error() {
        let err = CatalogError::BookNotFound { id: 7 };
        let upload: UploadError = err.into();
        assert!(matches!(
            upload,
            UploadError::Catalog(CatalogError::BookNotFound { id: 7 })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = CatalogError::BookNotFound { id: 42 };
        assert!(format!("{err}").contains("42"));

        let err = StoreError::DuplicateIsbn {
            isbn: "12345".into(),
        };
        assert!(format!("{err}").contains("12345"));

        let err = CatalogError::Validation { field: "title" };
        assert!(format!("{err}").contains("title"));
    }
}
