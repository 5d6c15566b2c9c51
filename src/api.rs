//! HTTP API for the catalog, served by `librisd`.
//!
//! Every response is the JSON envelope `{success, data?, error?, message?,
//! count?}`. Domain outcomes map onto statuses here and nowhere else:
//! not-found to 404, validation to 400, duplicate ISBNs to 409, storage
//! failures to 500. Unknown routes get the same envelope with a 404, and
//! malformed ids or bodies are caught by wrapper extractors so even
//! rejected requests answer with the envelope.

use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::error::{CatalogError, StoreError, UploadError};
use crate::model::{Book, BookPatch, FileRecord, NewBook, UploadSlot};
use crate::uploads::UploadCoordinator;

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// The JSON envelope every route answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            count: None,
        }
    }

    /// Success with `count` populated, for sequence-returning routes.
    pub fn with_count(data: T, count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::ok(data)
        }
    }

    /// Success with a human-readable confirmation alongside the data.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }
}

impl ApiResponse<()> {
    /// Success with only a confirmation message.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
            count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A domain error translated to an HTTP status plus envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            message: None,
            count: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::Validation { .. } => StatusCode::BAD_REQUEST,
            CatalogError::BookNotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::Store(StoreError::DuplicateIsbn { .. }) => StatusCode::CONFLICT,
            CatalogError::Store(StoreError::MissingBook { .. }) => StatusCode::NOT_FOUND,
            CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "catalog operation failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Catalog(e) => e.into(),
            UploadError::Store(e) => CatalogError::from(e).into(),
            other => {
                tracing::error!(error = %other, "upload operation failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: other.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// `Path` wrapper whose rejection is the JSON envelope.
///
/// axum answers an unparsable path segment with a plain-text 400; routing
/// it through [`ApiError`] keeps malformed requests inside the envelope
/// contract.
struct ApiPath<T>(T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Json` wrapper whose rejection is the JSON envelope.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

// ---------------------------------------------------------------------------
// State & router
// ---------------------------------------------------------------------------

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub uploads: UploadCoordinator,
}

/// Build the API router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/search/{query}", get(search_books))
        .route(
            "/api/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/api/books/{id}/files", get(book_files))
        .route("/api/upload-url", post(upload_url))
        .route("/api/files", post(register_file))
        .fallback(unknown_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::with_message(
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        }),
        "Library API is running",
    ))
}

async fn list_books(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Book>>>, ApiError> {
    let books = state.catalog.list_books().await?;
    let count = books.len();
    Ok(Json(ApiResponse::with_count(books, count)))
}

async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Book>>, ApiError> {
    let book = state.catalog.view_book(id).await?;
    Ok(Json(ApiResponse::ok(book)))
}

async fn create_book(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewBook>,
) -> Result<(StatusCode, Json<ApiResponse<Book>>), ApiError> {
    let book = state.catalog.add_book(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(book, "Book created successfully")),
    ))
}

async fn update_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<BookPatch>,
) -> Result<Json<ApiResponse<Book>>, ApiError> {
    let book = state.catalog.change_book(id, patch).await?;
    Ok(Json(ApiResponse::with_message(
        book,
        "Book updated successfully",
    )))
}

async fn delete_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let book = state.catalog.remove_book(id).await?;
    Ok(Json(ApiResponse::message_only(format!(
        "Book \"{}\" deleted successfully",
        book.title
    ))))
}

async fn search_books(
    State(state): State<AppState>,
    ApiPath(query): ApiPath<String>,
) -> Result<Json<ApiResponse<Vec<Book>>>, ApiError> {
    let books = state.catalog.find_books(&query).await?;
    let count = books.len();
    Ok(Json(ApiResponse::with_count(books, count)))
}

/// Body for `POST /api/upload-url`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub book_id: Option<i64>,
    pub filename: Option<String>,
    /// Defaults to `application/octet-stream`.
    pub content_type: Option<String>,
}

async fn upload_url(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UploadUrlRequest>,
) -> Result<Json<ApiResponse<UploadSlot>>, ApiError> {
    let (Some(book_id), Some(filename)) = (body.book_id, body.filename) else {
        return Err(ApiError::bad_request("bookId and filename are required"));
    };
    let content_type = body
        .content_type
        .unwrap_or_else(|| "application/octet-stream".into());

    let slot = state
        .uploads
        .request_slot(book_id, &filename, &content_type)
        .await?;
    Ok(Json(ApiResponse::ok(slot)))
}

/// Body for `POST /api/files`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFileRequest {
    pub book_id: Option<i64>,
    pub filename: Option<String>,
    pub object_name: Option<String>,
}

async fn register_file(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterFileRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FileRecord>>), ApiError> {
    let (Some(book_id), Some(filename), Some(object_name)) =
        (body.book_id, body.filename, body.object_name)
    else {
        return Err(ApiError::bad_request(
            "bookId, filename and objectName are required",
        ));
    };

    let record = state
        .uploads
        .register_upload(book_id, &filename, &object_name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            record,
            "File registered successfully",
        )),
    ))
}

async fn book_files(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>, ApiError> {
    let files = state.uploads.attachments(id).await?;
    let count = files.len();
    Ok(Json(ApiResponse::with_count(files, count)))
}

/// JSON 404 for anything outside the API surface.
async fn unknown_route() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Route not found".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use tempfile::TempDir;

    use crate::config::StorageConfig;
    use crate::store::BookStore;

    fn test_state(dir: &TempDir) -> AppState {
        let store = BookStore::open(dir.path().join("books.db")).unwrap();
        let catalog = Catalog::new(store.clone());
        let uploads = UploadCoordinator::new(catalog.clone(), store, StorageConfig::default());
        AppState { catalog, uploads }
    }

    /// GET (no body) or POST (with body) a URL, expecting an error status.
    fn request_error(url: &str, body: Option<&str>) -> (u16, String) {
        let result = match body {
            Some(payload) => ureq::post(url)
                .set("Content-Type", "application/json")
                .send_string(payload),
            None => ureq::get(url).call(),
        };
        match result {
            Err(ureq::Error::Status(code, resp)) => (code, resp.into_string().unwrap()),
            Ok(resp) => panic!("expected an error status, got {}", resp.status()),
            Err(e) => panic!("request failed: {e}"),
        }
    }

    fn assert_error_envelope(body: &str) {
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["success"], serde_json::Value::Bool(false));
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extractor_rejections_answer_with_the_envelope() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Non-numeric id in the path.
        let (status, body) = tokio::task::spawn_blocking(move || {
            request_error(&format!("http://{addr}/api/books/abc"), None)
        })
        .await
        .unwrap();
        assert_eq!(status, 400);
        assert_error_envelope(&body);

        // Body that is not JSON at all.
        let (status, body) = tokio::task::spawn_blocking(move || {
            request_error(&format!("http://{addr}/api/books"), Some("{not json"))
        })
        .await
        .unwrap();
        assert_eq!(status, 400);
        assert_error_envelope(&body);
    }

    #[tokio::test]
    async fn malformed_json_body_maps_to_bad_request() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/books")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let err = match ApiJson::<NewBook>::from_request(req, &()).await {
            Err(e) => e,
            Ok(_) => panic!("malformed body must be rejected"),
        };
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn envelope_hides_absent_fields() {
        let json = serde_json::to_string(&ApiResponse::ok(7)).unwrap();
        assert_eq!(json, "{\"success\":true,\"data\":7}");

        let json = serde_json::to_string(&ApiResponse::with_count(vec![1, 2], 2)).unwrap();
        assert_eq!(json, "{\"success\":true,\"data\":[1,2],\"count\":2}");

        let json = serde_json::to_string(&ApiResponse::message_only("done")).unwrap();
        assert_eq!(json, "{\"success\":true,\"message\":\"done\"}");
    }

    #[tokio::test]
    async fn error_responses_carry_the_envelope() {
        let response = ApiError::bad_request("bookId and filename are required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], serde_json::Value::Bool(false));
        assert_eq!(json["error"], "bookId and filename are required");
    }

    #[test]
    fn validation_maps_to_400() {
        let err: ApiError = CatalogError::Validation { field: "title" }.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("title"));
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = CatalogError::BookNotFound { id: 5 }.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_isbn_maps_to_409() {
        let err: ApiError = CatalogError::Store(StoreError::DuplicateIsbn {
            isbn: "978-1".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn upload_not_found_propagates_404() {
        let err: ApiError =
            UploadError::Catalog(CatalogError::BookNotFound { id: 9 }).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn presign_failure_maps_to_500() {
        let err: ApiError = UploadError::Presign {
            key: "books/1/a.pdf".into(),
            message: "endpoint unreachable".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
