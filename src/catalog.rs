//! The catalog service: validation and orchestration over the record store.
//!
//! Both presentation adapters (CLI and HTTP API) go through this layer, so
//! business rules are identical regardless of caller. Required-field checks
//! apply at creation only; updates merge into existing rows and can never
//! blank a required field.

use crate::error::{CatalogError, CatalogResult};
use crate::model::{Book, BookPatch, CatalogStats, GenreCount, NewBook};
use crate::store::BookStore;

/// Genre label substituted for books without one.
const UNKNOWN_GENRE: &str = "Unknown";

/// Validation and lookup contract shared by every caller.
#[derive(Clone)]
pub struct Catalog {
    store: BookStore,
}

impl Catalog {
    pub fn new(store: BookStore) -> Self {
        Self { store }
    }

    /// Validate and create a book, returning the full stored record.
    ///
    /// The record is re-read after insert so store-computed fields (id,
    /// timestamps) are accurate.
    pub async fn add_book(&self, book: NewBook) -> CatalogResult<Book> {
        if book.title.is_empty() {
            return Err(CatalogError::Validation { field: "title" });
        }
        if book.author.is_empty() {
            return Err(CatalogError::Validation { field: "author" });
        }

        let id = self.store.create_book(&book).await?;
        tracing::debug!(book_id = id, title = %book.title, "book created");
        self.store
            .get_book(id)
            .await?
            .ok_or(CatalogError::BookNotFound { id })
    }

    /// Return the book or a not-found outcome. Never panics for missing ids.
    pub async fn view_book(&self, id: i64) -> CatalogResult<Book> {
        self.store
            .get_book(id)
            .await?
            .ok_or(CatalogError::BookNotFound { id })
    }

    /// Apply a partial update and return the resulting record.
    ///
    /// Existence is confirmed first so an unknown id reports not-found
    /// without touching the store. A concurrent delete between the check
    /// and the update leaves the update affecting zero rows; that is
    /// tolerated, and the final re-read reports not-found.
    pub async fn change_book(&self, id: i64, patch: BookPatch) -> CatalogResult<Book> {
        self.view_book(id).await?;

        let affected = self.store.update_book(id, &patch).await?;
        if affected == 0 {
            tracing::debug!(book_id = id, "book vanished during update");
        }
        self.store
            .get_book(id)
            .await?
            .ok_or(CatalogError::BookNotFound { id })
    }

    /// Delete a book, returning the record as it was before deletion so
    /// callers can name what was removed.
    pub async fn remove_book(&self, id: i64) -> CatalogResult<Book> {
        let book = self.view_book(id).await?;

        let affected = self.store.delete_book(id).await?;
        if affected == 0 {
            tracing::debug!(book_id = id, "book vanished during delete");
        } else {
            tracing::debug!(book_id = id, title = %book.title, "book deleted");
        }
        Ok(book)
    }

    /// All books, most-recently-created first.
    pub async fn list_books(&self) -> CatalogResult<Vec<Book>> {
        Ok(self.store.list_books().await?)
    }

    /// Substring search over title, author, and genre. Zero matches is a
    /// normal empty result.
    pub async fn find_books(&self, query: &str) -> CatalogResult<Vec<Book>> {
        Ok(self.store.search_books(query).await?)
    }

    /// Total count plus per-genre counts, sorted by count descending.
    /// Ties keep the order genres were first encountered in the listing.
    pub async fn stats(&self) -> CatalogResult<CatalogStats> {
        let books = self.store.list_books().await?;

        let mut genres: Vec<GenreCount> = Vec::new();
        for book in &books {
            let label = match book.genre.as_deref() {
                Some(g) if !g.is_empty() => g,
                _ => UNKNOWN_GENRE,
            };
            match genres.iter_mut().find(|entry| entry.genre == label) {
                Some(entry) => entry.count += 1,
                None => genres.push(GenreCount {
                    genre: label.to_string(),
                    count: 1,
                }),
            }
        }
        // Stable sort keeps first-encountered order among equal counts.
        genres.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(CatalogStats {
            total: books.len(),
            genres,
        })
    }
}
