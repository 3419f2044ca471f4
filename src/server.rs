use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::convert::{convert_document, ConversionResult, UploadedFile};
use crate::db::{self, ConversionRow};
use crate::error::ConvertError;
use crate::extract::MimeType;

const DOCUMENT_FIELD: &str = "document";
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared across handlers. Each request gets its own engine run; only the
/// ledger connection is shared, behind a mutex.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub ledger: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn open(settings: Settings) -> Result<Self> {
        settings.ensure_dirs()?;
        let conn = db::connect(&settings.db_path)?;
        db::init_schema(&conn)?;
        Ok(Self {
            settings: Arc::new(settings),
            ledger: Arc::new(Mutex::new(conn)),
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
            details: None,
        }),
    )
}

fn reject(err: &ConvertError) -> ApiError {
    match err {
        ConvertError::UnsupportedType(_) | ConvertError::MissingFile => bad_request(err.to_string()),
        ConvertError::Conversion(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: "Error converting document".into(),
                details: Some(err.to_string()),
            }),
        ),
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /convert`: multipart upload in the `document` field.
pub async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConversionResult>, ApiError> {
    let upload = receive_document(&state.settings.uploads_dir, &mut multipart).await?;
    info!(
        "Received {} ({}, {} bytes) as {}",
        upload.original_name,
        upload.mime,
        upload.size,
        upload.path.display()
    );

    let settings = state.settings.clone();
    let ledger = state.ledger.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = convert_document(&upload, &settings);
        record(&ledger, &ConversionRow::from_outcome(&upload, &outcome));
        outcome
    })
    .await
    .map_err(|e| reject(&ConvertError::conversion(e)))?;

    match outcome {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            error!("{}", err);
            Err(reject(&err))
        }
    }
}

fn record(ledger: &Mutex<Connection>, row: &ConversionRow) {
    let Ok(conn) = ledger.lock() else {
        warn!("Ledger lock poisoned; {} not recorded", row.file_name);
        return;
    };
    if let Err(e) = db::insert_conversion(&conn, row) {
        warn!("Failed to record {}: {:#}", row.file_name, e);
    }
}

/// Store the first file sent in the `document` field. Other fields are ignored.
async fn receive_document(
    uploads_dir: &Path,
    multipart: &mut Multipart,
) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = match field.content_type() {
            Some(declared) => MimeType::parse(declared),
            None => MimeType::from_extension(Path::new(&original_name)),
        }
        .map_err(|e| {
            warn!("Rejected {}: {}", original_name, e);
            reject(&e)
        })?;

        let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
        let path = store_upload(uploads_dir, &bytes, mime)
            .await
            .map_err(|e| reject(&ConvertError::from(e)))?;
        return Ok(UploadedFile {
            original_name,
            path,
            size: bytes.len() as u64,
            mime,
        });
    }
    Err(reject(&ConvertError::MissingFile))
}

/// Write to `<dir>/<unix millis>.<ext>`, bumping the stamp on collision.
async fn store_upload(dir: &Path, bytes: &[u8], mime: MimeType) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut stamp = Utc::now().timestamp_millis();
    loop {
        let path = dir.join(format!("{}.{}", stamp, mime.extension()));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to store {}", path.display()))
            }
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/convert", post(convert))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await
}
