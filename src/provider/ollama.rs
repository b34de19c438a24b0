//! Ollama adapter (local HTTP server).
//!
//! Generation goes through `/api/generate`; streaming responses are
//! newline-delimited JSON, one object per event, with no `data:` framing.
//! Model discovery reads `/api/tags` and is deliberately lenient about the
//! response shape — local servers vary more than cloud APIs do.

use super::{ChunkStream, GenerationRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::stream::LineBuffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Local models can be slow to first token; give them five minutes.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaAdapter {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self::with_timeout(http, base_url, GENERATE_TIMEOUT)
    }

    pub fn with_timeout(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        let base_url = if base_url.is_empty() {
            crate::config::DEFAULT_OLLAMA_URL.to_string()
        } else {
            base_url
        };
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(&self, req: &GenerationRequest, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: req.model.clone(),
            prompt: req.prompt.clone(),
            stream,
            options: ModelOptions::default(),
        }
    }

    async fn post_generate(
        &self,
        body: &GenerateRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, req: GenerationRequest) -> Result<String, ProviderError> {
        let body = self.request_body(&req, false);

        // Dropping the in-flight future on expiry aborts the request.
        let fetch = async {
            let resp = self.post_generate(&body).await?;
            let text = resp.text().await?;
            Ok::<_, ProviderError>(text)
        };

        let text = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|_| ProviderError::Schema {
                provider: "Ollama",
                path: "response",
                summary: crate::error::body_summary(&text),
            })?;

        // A missing `response` field is an empty answer, not an error.
        Ok(parsed.response.unwrap_or_default())
    }

    async fn generate_stream(&self, req: GenerationRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.request_body(&req, true);
        let resp = self.post_generate(&body).await?;

        let (tx, rx) = mpsc::channel::<Result<String, ProviderError>>(64);

        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buf = LineBuffer::new();

            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::Transport(e))).await;
                        return;
                    }
                };

                for line in buf.push(&bytes) {
                    if let Some(text) = parse_ndjson_line(&line) {
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            if let Some(line) = buf.finish() {
                if let Some(text) = parse_ndjson_line(&line) {
                    let _ = tx.send(Ok(text)).await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let resp = match self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "local model discovery failed");
                return Ok(Vec::new());
            }
        };

        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "local model discovery rejected");
            return Ok(Vec::new());
        }

        match resp.json::<JsonValue>().await {
            Ok(body) => Ok(extract_model_names(&body)),
            Err(e) => {
                tracing::debug!(error = %e, "local model list is not JSON");
                Ok(Vec::new())
            }
        }
    }
}

/// Extract the `response` fragment from one NDJSON line.
///
/// Blank lines, unparseable lines, and events without content all yield
/// `None`; a malformed event is logged and skipped, never fatal.
pub(crate) fn parse_ndjson_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let event: StreamEvent = match serde_json::from_str(line) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(error = %e, line, "skipping malformed stream line");
            return None;
        }
    };

    event.response.filter(|s| !s.is_empty())
}

/// Pull model names out of an `/api/tags` body.
///
/// Expected shape is `{models: [...]}` with string or `{name}` elements;
/// anything else falls back to scanning top-level properties, and an
/// unrecognizable body produces the single sentinel entry.
pub(crate) fn extract_model_names(body: &JsonValue) -> Vec<String> {
    if let Some(models) = body.get("models").and_then(JsonValue::as_array) {
        return models.iter().filter_map(entry_name).collect();
    }

    let mut names = Vec::new();
    if let Some(map) = body.as_object() {
        for (key, value) in map {
            match value {
                JsonValue::Array(items) => names.extend(items.iter().filter_map(entry_name)),
                JsonValue::Object(_) => names.push(key.clone()),
                _ => {}
            }
        }
    }

    if names.is_empty() {
        names.push("no models found".to_string());
    }
    names
}

fn entry_name(entry: &JsonValue) -> Option<String> {
    match entry {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(map) => map
            .get("name")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// Wire DTOs
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: ModelOptions,
}

/// Sampling options tuned for instruction-following on small local models.
#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    num_predict: u32,
    num_ctx: u32,
    stop: Vec<&'static str>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.05,
            top_p: 0.8,
            top_k: 20,
            repeat_penalty: 1.3,
            num_predict: 8000,
            num_ctx: 16384,
            stop: vec!["```", "\n\n---", "END", "STOP"],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    response: Option<String>,
}
