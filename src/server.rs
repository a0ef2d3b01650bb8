//! HTTP service boundary.
//!
//! Thin axum handlers over the orchestrator. Handlers validate and
//! translate; all pipeline behavior lives behind
//! [`DocumentOrchestrator`].

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::Document;
use crate::orchestrator::{DocumentOrchestrator, RequestError};

type AppState = Arc<DocumentOrchestrator>;

/// Builds the orchestrator from `config` and serves until shutdown.
pub async fn run_server(config: Config) -> Result<()> {
    let bind = config.server.bind.clone();
    let orchestrator = DocumentOrchestrator::from_config(config)?;
    let app = build_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    tracing::info!(bind = %bind, "listening");
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}

pub fn build_router(orchestrator: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    // axum caps request bodies at 2 MiB by default, far below a typical PDF.
    let body_limit = DefaultBodyLimit::max(orchestrator.config().server.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/upload", post(upload))
        .route("/search", post(search))
        .route("/documents", get(list_documents))
        .route("/documents/{id}", delete(delete_document))
        .route("/clear", delete(clear))
        .layer(body_limit)
        .layer(cors)
        .with_state(orchestrator)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(orchestrator): State<AppState>) -> Response {
    Json(orchestrator.status().await).into_response()
}

async fn upload(
    State(orchestrator): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("file field has no filename".to_string()))?;
        // Oversized bodies surface here as a 413 from the multipart layer.
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::new(e.status(), format!("reading upload: {}", e)))?;

        let receipt = orchestrator.upload(&file_name, bytes.to_vec()).await?;
        return Ok(Json(receipt).into_response());
    }
    Err(AppError::bad_request(
        "multipart body must contain a 'file' field".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    similarity_threshold: Option<f32>,
}

async fn search(
    State(orchestrator): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, AppError> {
    let result = orchestrator
        .search(
            &request.query,
            request.max_results,
            request.similarity_threshold,
        )
        .await?;
    Ok(Json(result).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentsResponse {
    documents: Vec<Document>,
    total: usize,
}

async fn list_documents(State(orchestrator): State<AppState>) -> Response {
    let documents = orchestrator.list().await;
    let total = documents.len();
    Json(DocumentsResponse { documents, total }).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    document_id: String,
    deleted: bool,
}

async fn delete_document(
    State(orchestrator): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let deleted = orchestrator.delete(&id).await?;
    Ok(Json(DeleteResponse {
        document_id: id,
        deleted,
    })
    .into_response())
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    message: &'static str,
}

async fn clear(State(orchestrator): State<AppState>) -> Result<Response, AppError> {
    orchestrator.clear_all().await?;
    Ok(Json(ClearResponse {
        message: "all documents cleared",
    })
    .into_response())
}

// ============ Error mapping ============

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }

    fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Caller-correctable rejections are typed; everything else from the
        // pipeline is an internal error.
        let status = if err.downcast_ref::<RequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.status.as_u16(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
