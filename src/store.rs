//! SQLite-backed record store for books and their attached files.
//!
//! The store owns a single connection behind an async mutex and is cheap to
//! clone; construct it once and hand clones to the catalog and the upload
//! coordinator. Every operation is a single statement, so there is nothing
//! to roll back. Timestamps are stored as RFC 3339 text, which sorts
//! chronologically.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::model::{Book, BookPatch, FileRecord, NewBook};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    isbn TEXT UNIQUE,
    published_year INTEGER,
    genre TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    object_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
);
";

/// Most-recently-created first; id breaks ties between equal timestamps.
const BOOK_ORDER: &str = "ORDER BY created_at DESC, id DESC";

const BOOK_COLUMNS: &str = "id, title, author, isbn, published_year, genre, created_at, updated_at";

/// Handle to the SQLite store. Clones share one connection.
#[derive(Clone)]
pub struct BookStore {
    conn: Arc<Mutex<Connection>>,
}

impl BookStore {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// Schema creation is idempotent, so opening an existing database is
    /// safe. `AUTOINCREMENT` keeps deleted ids from being reused.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            source: e,
        })?;
        conn.execute_batch(SCHEMA).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "opened book store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// All books, most-recently-created first.
    pub async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books {BOOK_ORDER}"))
            .map_err(|e| StoreError::Sqlite { source: e })?;
        let books = stmt
            .query_map([], book_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| StoreError::Sqlite { source: e })?;
        Ok(books)
    }

    /// Look a book up by id. Absence is a valid empty result.
    pub async fn get_book(&self, id: i64) -> StoreResult<Option<Book>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite { source: e })
    }

    /// Insert a new book and return its assigned id.
    ///
    /// `created_at` and `updated_at` are set to the same instant. A
    /// colliding ISBN yields [`StoreError::DuplicateIsbn`].
    pub async fn create_book(&self, book: &NewBook) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO books (title, author, isbn, published_year, genre, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                book.title,
                book.author,
                book.isbn,
                book.published_year,
                book.genre,
                now
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateIsbn {
                    isbn: book.isbn.clone().unwrap_or_default(),
                }
            } else {
                StoreError::Sqlite { source: e }
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Apply a partial update. Absent patch fields retain their stored
    /// values via COALESCE; `updated_at` is always refreshed.
    ///
    /// Returns the affected-row count: 0 when the id does not exist, which
    /// is not an error (a concurrent delete between a caller's existence
    /// check and this call must stay silent).
    pub async fn update_book(&self, id: i64, patch: &BookPatch) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE books
             SET title = COALESCE(?1, title),
                 author = COALESCE(?2, author),
                 isbn = COALESCE(?3, isbn),
                 published_year = COALESCE(?4, published_year),
                 genre = COALESCE(?5, genre),
                 updated_at = ?6
             WHERE id = ?7",
            params![
                patch.title,
                patch.author,
                patch.isbn,
                patch.published_year,
                patch.genre,
                now,
                id
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateIsbn {
                    isbn: patch.isbn.clone().unwrap_or_default(),
                }
            } else {
                StoreError::Sqlite { source: e }
            }
        })
    }

    /// Delete a book row. Attached file rows cascade. Returns the
    /// affected-row count (0 when absent, not an error).
    pub async fn delete_book(&self, id: i64) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Sqlite { source: e })
    }

    /// Books whose title, author, or genre contains `query`,
    /// case-insensitively, in the same order as [`list_books`]. The empty
    /// query matches every book.
    pub async fn search_books(&self, query: &str) -> StoreResult<Vec<Book>> {
        let conn = self.conn.lock().await;
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books
                 WHERE LOWER(title) LIKE ?1
                    OR LOWER(author) LIKE ?1
                    OR LOWER(genre) LIKE ?1
                 {BOOK_ORDER}"
            ))
            .map_err(|e| StoreError::Sqlite { source: e })?;
        let books = stmt
            .query_map(params![pattern], book_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| StoreError::Sqlite { source: e })?;
        Ok(books)
    }

    /// Record an uploaded file against a book and return the stored row.
    ///
    /// A `book_id` that references no book yields
    /// [`StoreError::MissingBook`]; the catalog pre-checks and reports a
    /// domain not-found before the constraint can fire.
    pub async fn create_file(
        &self,
        book_id: i64,
        filename: &str,
        object_name: &str,
    ) -> StoreResult<FileRecord> {
        let conn = self.conn.lock().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO files (book_id, filename, object_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![book_id, filename, object_name, now.to_rfc3339()],
        )
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::MissingBook { book_id }
            } else {
                StoreError::Sqlite { source: e }
            }
        })?;
        Ok(FileRecord {
            id: conn.last_insert_rowid(),
            book_id,
            filename: filename.to_string(),
            object_name: object_name.to_string(),
            created_at: now,
        })
    }

    /// Files attached to a book, in creation order. An unknown book yields
    /// an empty list; this layer does not distinguish the two cases.
    pub async fn files_for_book(&self, book_id: i64) -> StoreResult<Vec<FileRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, filename, object_name, created_at
                 FROM files WHERE book_id = ?1 ORDER BY created_at ASC, id ASC",
            )
            .map_err(|e| StoreError::Sqlite { source: e })?;
        let files = stmt
            .query_map(params![book_id], file_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| StoreError::Sqlite { source: e })?;
        Ok(files)
    }
}

fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        published_year: row.get(4)?,
        genre: row.get(5)?,
        created_at: parse_timestamp(6, row.get(6)?)?,
        updated_at: parse_timestamp(7, row.get(7)?)?,
    })
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        book_id: row.get(1)?,
        filename: row.get(2)?,
        object_name: row.get(3)?,
        created_at: parse_timestamp(4, row.get(4)?)?,
    })
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}
