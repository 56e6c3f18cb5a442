//! Ollama API client for local LLM generation.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ModelFailure;

/// Timeout for the `/api/tags` availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ollama client for single-shot JSON generation.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            endpoint,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.ollama_url.clone(),
            settings.ollama_model.clone(),
            settings.model_timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one non-streaming generation constrained to JSON output.
    /// Returns the raw `response` string.
    pub async fn generate_json(&self, prompt: &str) -> Result<String, ModelFailure> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        debug!(
            "Sending request to Ollama: model={} prompt_chars={}",
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelFailure::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelFailure::Status(status));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelFailure::from_reqwest(e, self.timeout))?;

        if let Some(total) = body.total_duration {
            info!(
                "Ollama response: {} chars in {} ms",
                body.response.as_deref().map(str::len).unwrap_or(0),
                total / 1_000_000
            );
        }

        body.response.ok_or(ModelFailure::Empty)
    }

    /// List the model names the endpoint has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelFailure> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ModelFailure::from_reqwest(e, PROBE_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelFailure::Status(status));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ModelFailure::from_reqwest(e, PROBE_TIMEOUT))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Probe the endpoint and report whether the configured model is pulled.
    pub async fn status(&self) -> ModelStatus {
        let (reachable, models) = match self.list_models().await {
            Ok(models) => (true, models),
            Err(e) => {
                debug!("Ollama probe failed: {}", e);
                (false, Vec::new())
            }
        };

        let model_available = models.iter().any(|name| name.contains(&self.model));

        ModelStatus {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            reachable,
            model_available,
            models,
        }
    }
}

/// Result of probing the model endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub endpoint: String,
    pub model: String,
    pub reachable: bool,
    pub model_available: bool,
    pub models: Vec<String>,
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    /// Nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_endpoint, spawn_stub};
    use axum::{http::StatusCode, routing::{get, post}, Json, Router};
    use serde_json::{json, Value};

    fn client(endpoint: &str) -> OllamaClient {
        OllamaClient::new(endpoint, "llama3", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_generate_sends_expected_body() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                // Echo the request back so the test can inspect it.
                Json(json!({ "response": body.to_string(), "done": true }))
            }),
        );
        let endpoint = spawn_stub(app).await;

        let raw = client(&format!("{}/", endpoint)).generate_json("hello").await.unwrap();
        let sent: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            sent,
            json!({ "model": "llama3", "prompt": "hello", "stream": false, "format": "json" })
        );
    }

    #[tokio::test]
    async fn test_generate_non_success_status() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let endpoint = spawn_stub(app).await;

        let err = client(&endpoint).generate_json("hello").await.unwrap_err();
        assert!(matches!(err, ModelFailure::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_generate_missing_response_field() {
        let app = Router::new().route("/api/generate", post(|| async { Json(json!({ "done": true })) }));
        let endpoint = spawn_stub(app).await;

        let err = client(&endpoint).generate_json("hello").await.unwrap_err();
        assert!(matches!(err, ModelFailure::Empty));
    }

    #[tokio::test]
    async fn test_generate_unreachable() {
        let endpoint = closed_endpoint().await;
        let err = client(&endpoint).generate_json("hello").await.unwrap_err();
        assert!(matches!(err, ModelFailure::Connect(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_generate_timeout() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "response": "{}" }))
            }),
        );
        let endpoint = spawn_stub(app).await;

        let client = OllamaClient::new(endpoint, "llama3", Duration::from_millis(200));
        let err = client.generate_json("hello").await.unwrap_err();
        assert!(matches!(err, ModelFailure::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_status_detects_model() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async { Json(json!({ "models": [{ "name": "mistral:7b" }, { "name": "llama3:latest" }] })) }),
        );
        let endpoint = spawn_stub(app).await;

        let status = client(&endpoint).status().await;
        assert!(status.reachable);
        assert!(status.model_available);
        assert_eq!(status.models.len(), 2);
    }

    #[tokio::test]
    async fn test_status_unreachable() {
        let endpoint = closed_endpoint().await;
        let status = client(&endpoint).status().await;
        assert!(!status.reachable);
        assert!(!status.model_available);
        assert!(status.models.is_empty());
    }
}
