//! HTTP front end: upload a scanned document, get the extraction envelope back.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ModelMode;
use crate::error::PipelineError;
use crate::ollama::ModelStatus;
use crate::pipeline::Pipeline;
use crate::record::ResultEnvelope;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/model/status", get(model_status))
        .route("/extract", post(extract_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

pub async fn serve(bind: &str, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Probe the model endpoint.
async fn model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.pipeline.extractor().model().status().await)
}

#[derive(serde::Deserialize)]
struct ExtractQuery {
    mode: Option<ModelMode>,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    let envelope = ResultEnvelope::failure(message);
    (status, Json(serde_json::to_value(envelope).unwrap_or(Value::Null)))
}

/// Upload an image and run the pipeline on it.
async fn extract_upload(
    State(state): State<AppState>,
    Query(query): Query<ExtractQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("document").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    }

    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let path = upload_path(&filename);
    tokio::fs::write(&path, &file_data).await.map_err(|e| {
        error!("Failed to stage upload {:?}: {}", path, e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store upload: {}", e),
        )
    })?;

    let use_model = state
        .pipeline
        .extractor()
        .resolve_mode(query.mode.unwrap_or_default())
        .await;

    let result = state
        .pipeline
        .clone()
        .process_guarded(path.clone(), use_model)
        .await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to remove staged upload {:?}: {}", path, e);
    }

    match result {
        Ok(output) => {
            let method = output.extraction.method;
            let mut body = serde_json::to_value(output.into_envelope()).map_err(|e| {
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            })?;
            if let Some(obj) = body.as_object_mut() {
                obj.insert("method".to_string(), Value::String(method.to_string()));
            }
            Ok(Json(body))
        }
        Err(e) => {
            error!("Extraction failed for {}: {}", filename, e);
            let status = match e {
                PipelineError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            Err(api_error(status, e.to_string()))
        }
    }
}

/// Temp path for an upload, keeping the original extension so the image
/// decoder can fall back on it.
fn upload_path(filename: &str) -> PathBuf {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    std::env::temp_dir().join(format!("fica-upload-{}{}", Uuid::new_v4(), ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Extractor;
    use crate::ocr::OcrEngine;
    use crate::ollama::OllamaClient;
    use crate::patterns::PatternExtractor;
    use crate::test_support::{closed_endpoint, spawn_stub, StaticOcr};
    use std::time::Duration;

    async fn server_with(ocr: Arc<dyn OcrEngine>) -> String {
        let model = OllamaClient::new(closed_endpoint().await, "llama3", Duration::from_secs(5));
        let pipeline = Arc::new(Pipeline::new(
            ocr,
            Extractor::new(PatternExtractor::builtin(), model),
        ));
        spawn_stub(router(pipeline)).await
    }

    fn upload_form(bytes: &[u8]) -> String {
        // Hand-built multipart body; the client has no multipart feature.
        let mut body = String::new();
        body.push_str("--XBOUNDARY\r\n");
        body.push_str("Content-Disposition: form-data; name=\"file\"; filename=\"id.png\"\r\n");
        body.push_str("Content-Type: image/png\r\n\r\n");
        body.push_str(&String::from_utf8_lossy(bytes));
        body.push_str("\r\n--XBOUNDARY--\r\n");
        body
    }

    async fn post_upload(base: &str, query: &str, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/extract{}", base, query))
            .header("Content-Type", "multipart/form-data; boundary=XBOUNDARY")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let base = server_with(Arc::new(StaticOcr::new("x"))).await;
        let text = reqwest::get(format!("{}/health", base)).await.unwrap().text().await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_upload_returns_envelope_with_method() {
        let base = server_with(Arc::new(StaticOcr::new("Name: JOHN SMITH\nIncome: R15,000"))).await;

        let response = post_upload(&base, "?mode=on", upload_form(b"fake image bytes")).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["tenantData"]["fullName"], "JOHN SMITH");
        assert_eq!(body["tenantData"]["income"], "R15000");
        // Model endpoint is closed, so the pattern rules answered.
        assert_eq!(body["method"], "pattern");
    }

    #[tokio::test]
    async fn test_empty_text_is_unprocessable() {
        let base = server_with(Arc::new(StaticOcr::new("   "))).await;

        let response = post_upload(&base, "", upload_form(b"fake image bytes")).await;
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, serde_json::json!({ "error": "No text extracted from image" }));
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let base = server_with(Arc::new(StaticOcr::new("x"))).await;
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--XBOUNDARY--\r\n".to_string();

        let response = post_upload(&base, "", body).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No file uploaded");
    }

    #[test]
    fn test_upload_path_keeps_safe_extension() {
        let path = upload_path("scan.PNG");
        assert!(path.to_string_lossy().ends_with(".png"));
        assert!(path.starts_with(std::env::temp_dir()));

        let path = upload_path("no-extension");
        assert!(path.extension().is_none());
    }
}
