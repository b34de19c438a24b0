//! DeepSeek adapter (OpenAI-compatible chat-completions API).
//!
//! Non-streaming calls parse one JSON body; streaming calls speak the
//! `data: {json}` SSE line protocol terminated by `data: [DONE]`.

use super::{ChunkStream, GenerationRequest, ProviderAdapter};
use crate::error::{body_summary, ProviderError};
use crate::stream::LineBuffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

const CONTENT_PATH: &str = "choices[0].message.content";

#[derive(Debug, Clone)]
pub struct DeepSeekAdapter {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl DeepSeekAdapter {
    pub fn new(http: reqwest::Client, api_key: String, api_url: String) -> Self {
        let api_url = if api_url.is_empty() {
            crate::config::DEFAULT_DEEPSEEK_URL.to_string()
        } else {
            api_url
        };
        Self {
            http,
            api_key,
            api_url,
        }
    }

    fn require_key(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Configuration {
                provider: "DeepSeek",
            });
        }
        Ok(())
    }

    /// Sibling discovery endpoint, derived from the chat-completions URL.
    fn models_url(&self) -> String {
        match self.api_url.strip_suffix("/chat/completions") {
            Some(base) => format!("{base}/models"),
            None => format!("{}/models", self.api_url.trim_end_matches('/')),
        }
    }

    fn request_body(&self, req: &GenerationRequest, stream: bool) -> ChatRequestBody {
        ChatRequestBody {
            model: req.model.clone(),
            messages: vec![ApiMessage {
                role: "user",
                content: req.prompt.clone(),
            }],
            stream,
            temperature: 0.1,
            max_tokens: 8000,
            top_p: 0.9,
        }
    }

    async fn post(
        &self,
        body: &ChatRequestBody,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
impl ProviderAdapter for DeepSeekAdapter {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    async fn generate(&self, req: GenerationRequest) -> Result<String, ProviderError> {
        self.require_key()?;

        let body = self.request_body(&req, false);
        let resp = self.post(&body).await?;
        let text = resp.text().await?;

        parse_chat_completion(&text)
    }

    async fn generate_stream(&self, req: GenerationRequest) -> Result<ChunkStream, ProviderError> {
        self.require_key()?;

        let body = self.request_body(&req, true);
        let resp = self.post(&body).await?;

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
                    match parse_sse_line(&line) {
                        SseLine::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                // Consumer abandoned the stream; dropping the
                                // body stream closes the connection.
                                return;
                            }
                        }
                        SseLine::Done => return,
                        SseLine::Ignored => {}
                    }
                }
            }

            // A final line without a trailing newline is still a line.
            if let Some(line) = buf.finish() {
                if let SseLine::Delta(text) = parse_sse_line(&line) {
                    let _ = tx.send(Ok(text)).await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        // No credentials: an empty catalog, never a fabricated one.
        if self.api_key.is_empty() {
            return Ok(Vec::new());
        }

        match self.fetch_models().await {
            Some(models) => Ok(models),
            None => Ok(Vec::new()),
        }
    }
}

impl DeepSeekAdapter {
    async fn fetch_models(&self) -> Option<Vec<String>> {
        let resp = self
            .http
            .get(self.models_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| tracing::debug!(error = %e, "model discovery request failed"))
            .ok()?;

        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "model discovery rejected");
            return None;
        }

        let list: ModelList = resp
            .json()
            .await
            .map_err(|e| tracing::debug!(error = %e, "model list did not match expected shape"))
            .ok()?;

        Some(
            list.data
                .into_iter()
                .filter_map(|m| m.id.or(m.name))
                .collect(),
        )
    }
}

/// One logical SSE line, classified.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    /// A content fragment to deliver.
    Delta(String),
    /// The `[DONE]` sentinel: the sequence completes, nothing is emitted.
    Done,
    /// Blank line, non-data field, empty delta, or unparseable payload.
    Ignored,
}

/// Classify one line of an SSE response body.
///
/// A payload that is not valid JSON is logged and skipped; one malformed
/// event must not abort an otherwise-good stream.
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data: ") else {
        return SseLine::Ignored;
    };

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(error = %e, line = data, "skipping malformed stream line");
            return SseLine::Ignored;
        }
    };

    match event
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(text) => SseLine::Delta(text),
        None => SseLine::Ignored,
    }
}

/// Extract `choices[0].message.content` from a non-streaming response body.
pub(crate) fn parse_chat_completion(body: &str) -> Result<String, ProviderError> {
    let schema_err = || ProviderError::Schema {
        provider: "DeepSeek",
        path: CONTENT_PATH,
        summary: body_summary(body),
    };

    let parsed: ChatResponse = serde_json::from_str(body).map_err(|_| schema_err())?;
    let choice = parsed.choices.into_iter().next().ok_or_else(schema_err)?;
    Ok(choice.message.content)
}

// -----------------------------------------------------------------------------
// Wire DTOs
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}
