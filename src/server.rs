//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/upload` | Multipart upload (field `file`); ingestion runs in the background |
//! | `GET`  | `/documents/{id}/status` | Ingestion state of a document |
//! | `POST` | `/chat` | Answer a message, with a document's context when `document_id` is set |
//! | `GET`  | `/v1/models` | Empty model list for OpenAI-style clients |
//! | `GET`  | `/favicon.ico` | 204 |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large`
//! (413), `chat_error` (500). Chat failures never carry provider details.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docchat_core::models::DocumentId;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppServices;
use crate::chat::{ChatError, ChatRequest, ChatResponse};
use crate::config::Config;
use crate::ingest::{IngestionStatus, Upload};

/// Starts the HTTP server on `[server].bind` with providers built from
/// `config`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = AppServices::from_config(config).await?;
    run_server_with_services(&config.server.bind, services, config.server.max_upload_bytes).await
}

/// Starts the server with pre-built services (tests, embedding binaries).
pub async fn run_server_with_services(
    bind_addr: &str,
    services: AppServices,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let app = router(services, max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("docchat listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(services: AppServices, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/documents/{id}/status", get(handle_status))
        .route("/chat", post(handle_chat))
        .route("/v1/models", get(handle_models))
        .route("/favicon.ico", get(handle_favicon))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(message) => bad_request(message),
            ChatError::Processing { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "chat_error".to_string(),
                message: "An error occurred during chat processing.".to_string(),
            },
        }
    }
}

// ============ GET / and friends ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "docchat API is running." }))
}

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "data": [] }))
}

async fn handle_favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    document_id: DocumentId,
}

/// Accepts the first multipart field named `file` and returns 202 as soon
/// as the ingestion job is spawned.
async fn handle_upload(
    State(services): State<AppServices>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(&e.to_string(), e.status()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(&e.to_string(), e.status()))?;

        let ticket = services.ingestion.submit(Upload::new(filename, bytes.to_vec()));
        return Ok((
            StatusCode::ACCEPTED,
            Json(UploadResponse {
                message: "File upload accepted and is being processed.".to_string(),
                document_id: ticket.document_id,
            }),
        ));
    }

    Err(bad_request("no file provided (expected multipart field 'file')"))
}

fn upload_error(message: &str, status: StatusCode) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError {
            status,
            code: "payload_too_large".to_string(),
            message: message.to_string(),
        }
    } else {
        bad_request(message)
    }
}

// ============ GET /documents/{id}/status ============

async fn handle_status(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> Result<Json<IngestionStatus>, AppError> {
    services
        .ingestion
        .status(&DocumentId::new(id.clone()))
        .map(Json)
        .ok_or_else(|| not_found(format!("no ingestion recorded for document: {}", id)))
}

// ============ POST /chat ============

/// Malformed bodies (missing `message`, history entries without
/// `content`, non-JSON) are reported as `bad_request`.
async fn handle_chat(
    State(services): State<AppServices>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    let response = services.chat.handle(request).await?;
    Ok(Json(response))
}
