// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # libris
//!
//! A personal book catalog: a SQLite-backed store of books and their file
//! attachments, a service layer with the catalog rules, and two binaries
//! on top of it.
//!
//! ## Architecture
//!
//! - **Record store** (`store`): SQLite via `rusqlite`, books + files tables
//! - **Book service** (`catalog`): validation, search, stats, genre grouping
//! - **Upload coordinator** (`uploads`): pre-signed S3 PUT URLs, file registry
//! - **HTTP API** (`api`): axum router served by the `librisd` binary
//! - **Server control** (`client`): PID-file discovery, spawn/SIGTERM, log tail
//!
//! ## Library usage
//!
//! ```no_run
//! use libris::catalog::Catalog;
//! use libris::model::NewBook;
//! use libris::store::BookStore;
//!
//! # async fn demo() -> libris::error::LibrisResult<()> {
//! let store = BookStore::open("library.db")?;
//! let catalog = Catalog::new(store);
//! let book = catalog
//!     .add_book(NewBook {
//!         title: "Dune".into(),
//!         author: "Frank Herbert".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("added book {}", book.id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod store;
pub mod uploads;
