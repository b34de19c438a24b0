//! Claude adapter (Anthropic messages API).
//!
//! Single-shot completions only; the API's streaming mode is not wired up,
//! so the trait's default `generate_stream` refusal applies. There is no
//! model-discovery endpoint either — `list_models` returns the fixed
//! catalog the router accepts.

use super::{GenerationRequest, ProviderAdapter};
use crate::error::{body_summary, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-5-sonnet-20241022";
const CONTENT_PATH: &str = "content[0].text";

#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl ClaudeAdapter {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self::with_api_url(http, api_key, API_URL.to_string())
    }

    pub fn with_api_url(http: reqwest::Client, api_key: String, api_url: String) -> Self {
        Self {
            http,
            api_key,
            api_url,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate(&self, req: GenerationRequest) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Configuration { provider: "Claude" });
        }

        let body = MessagesRequest {
            model: MODEL,
            messages: vec![ApiMessage {
                role: "user",
                content: req.prompt,
            }],
            max_tokens: 8000,
        };

        let resp = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let text = resp.text().await?;
        parse_messages_response(&text)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["Claude".to_string()])
    }
}

/// Extract `content[0].text` from a messages-API response body.
pub(crate) fn parse_messages_response(body: &str) -> Result<String, ProviderError> {
    let schema_err = || ProviderError::Schema {
        provider: "Claude",
        path: CONTENT_PATH,
        summary: body_summary(body),
    };

    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|_| schema_err())?;
    let block = parsed.content.into_iter().next().ok_or_else(schema_err)?;
    Ok(block.text)
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: &'static str,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn generate_extracts_first_content_block() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/v1/messages")
                    .header("x-api-key", "ck-test")
                    .header("anthropic-version", API_VERSION);
                then.status(200).json_body(serde_json::json!({
                    "content": [{"type": "text", "text": "hello from claude"}]
                }));
            })
            .await;

        let a = ClaudeAdapter::with_api_url(
            reqwest::Client::new(),
            "ck-test".into(),
            server.url("/v1/messages"),
        );
        let out = a
            .generate(GenerationRequest::new("Claude", "hi"))
            .await
            .unwrap();
        assert_eq!(out, "hello from claude");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200);
            })
            .await;

        let a = ClaudeAdapter::with_api_url(
            reqwest::Client::new(),
            String::new(),
            server.url("/v1/messages"),
        );
        let err = a
            .generate(GenerationRequest::new("Claude", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration { .. }));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn streaming_is_refused() {
        let a = ClaudeAdapter::new(reqwest::Client::new(), "ck".into());
        let err = a
            .generate_stream(GenerationRequest::new("Claude", "hi"))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedModel(_)));
    }

    #[test]
    fn schema_error_names_the_missing_path() {
        let err = parse_messages_response(r#"{"content":[]}"#).unwrap_err();
        assert!(err.to_string().contains("content[0].text"));
    }

    #[tokio::test]
    async fn fixed_catalog_is_enumerated() {
        let a = ClaudeAdapter::new(reqwest::Client::new(), String::new());
        assert_eq!(a.list_models().await.unwrap(), vec!["Claude"]);
    }
}
