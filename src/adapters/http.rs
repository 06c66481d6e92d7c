//! HTTP surface: `GET /` liveness and `POST /upload`.

use crate::adapters::llm::OllamaClient;
use crate::adapters::ocr::build_engine;
use crate::adapters::storage::LocalStorage;
use crate::config::ServerConfig;
use crate::core::pipeline::TicketPipeline;
use crate::domain::model::{UploadOptions, UploadResponse, UploadedImage};
use crate::utils::error::{Result, TicketError};
use crate::utils::monitor::SystemMonitor;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const LIVENESS_MESSAGE: &str = "AI Ticket Validator backend is running";

pub type SharedPipeline = Arc<TicketPipeline<LocalStorage, OllamaClient>>;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    pub save_by_default: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline, config: &ServerConfig) -> Self {
        Self {
            pipeline,
            save_by_default: config.save_by_default,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wires the production pipeline: local uploads directory, the
    /// configured OCR engine and the Ollama client.
    pub fn from_config(config: &ServerConfig, monitor: Arc<SystemMonitor>) -> Result<Self> {
        std::fs::create_dir_all(&config.upload_dir)?;

        let storage = LocalStorage::new(&config.upload_dir);
        let ocr = build_engine(&config.ocr)?;
        let parser = OllamaClient::new(&config.llm)?;
        tracing::info!(
            ocr_engine = ocr.name(),
            model = parser.model(),
            llm_url = %config.llm.url,
            upload_dir = %config.upload_dir,
            "Pipeline ready"
        );

        let pipeline =
            TicketPipeline::new(storage, ocr, parser, config.ocr.upscale).with_monitor(monitor);
        Ok(Self::new(Arc::new(pipeline), config))
    }
}

/// Error body returned by the handlers: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(
                "❌ Upload failed: {} (Category: {:?}, Severity: {:?})",
                err,
                err.category(),
                err.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", err.recovery_suggestion());
        } else {
            tracing::warn!("Rejected upload: {}", err);
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        tracing::warn!("Malformed multipart body: {}", err.body_text());
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    save: Option<String>,
}

impl UploadQuery {
    /// Accepts the usual truthy spellings (`true`, `1`, `yes`, `on`).
    fn save_flag(&self) -> Option<bool> {
        self.save.as_deref().map(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
    }
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": LIVENESS_MESSAGE }))
}

pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    let options = UploadOptions {
        save: query.save_flag().unwrap_or(state.save_by_default),
    };

    let response = state.pipeline.process(upload, options).await?;
    Ok(Json(response))
}

async fn read_file_field(
    multipart: &mut Multipart,
) -> std::result::Result<UploadedImage, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();

        return Ok(UploadedImage {
            filename,
            content_type,
            bytes,
        });
    }

    Err(TicketError::InvalidUpload {
        message: "multipart field 'file' is required".to_string(),
    }
    .into())
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn start_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);
    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
