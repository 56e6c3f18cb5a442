//! Shared fixtures for unit tests: in-process HTTP stubs and OCR doubles.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{routing::post, Json, Router};
use serde_json::json;

use crate::error::OcrError;
use crate::ocr::OcrEngine;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Ollama stub whose `/api/generate` always answers with `response`.
pub async fn ollama_stub(response: &'static str) -> String {
    let app = Router::new().route(
        "/api/generate",
        post(move || async move { Json(json!({ "model": "llama3", "response": response, "done": true })) }),
    );
    spawn_stub(app).await
}

/// Base URL of a local port with nothing listening on it.
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// OCR double returning fixed text and counting calls.
pub struct StaticOcr {
    text: String,
    calls: AtomicUsize,
}

impl StaticOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl OcrEngine for StaticOcr {
    fn name(&self) -> &str {
        "static"
    }

    async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// OCR double that always reports an engine error.
pub struct FailingOcr {
    message: String,
}

impl FailingOcr {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl OcrEngine for FailingOcr {
    fn name(&self) -> &str {
        "failing"
    }

    async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
        Err(OcrError::Engine(self.message.clone()))
    }
}

/// OCR double that panics mid-run.
pub struct PanickingOcr;

#[async_trait::async_trait]
impl OcrEngine for PanickingOcr {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
        panic!("ocr engine exploded");
    }
}
