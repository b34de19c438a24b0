//! The routing façade over the three provider adapters.
//!
//! One `AiService` per process, constructed explicitly by the host and
//! shared by reference; there is no hidden global. Adapters are immutable
//! once built — configuration updates swap in a freshly built adapter, and
//! requests already in flight keep the one they captured.

use crate::config::Settings;
use crate::error::ProviderError;
use crate::provider::claude::ClaudeAdapter;
use crate::provider::deepseek::DeepSeekAdapter;
use crate::provider::ollama::OllamaAdapter;
use crate::provider::{ChunkStream, GenerationRequest, ProviderAdapter};
use anyhow::Context;
use parking_lot::RwLock;
use std::sync::Arc;

const OLLAMA_PREFIX: &str = "ollama:";

/// Which adapter a model identifier resolves to.
#[derive(Debug, PartialEq)]
enum Route {
    DeepSeek,
    Claude,
    /// Local model, prefix already stripped.
    Ollama(String),
}

fn route(model: &str) -> Result<Route, ProviderError> {
    if let Some(local) = model.strip_prefix(OLLAMA_PREFIX) {
        return Ok(Route::Ollama(local.to_string()));
    }

    match model {
        "deepseek-chat" | "deepseek-coder" | "deepseek-reasoner" => Ok(Route::DeepSeek),
        "Claude" => Ok(Route::Claude),
        _ => Err(ProviderError::UnsupportedModel(model.to_string())),
    }
}

pub struct AiService {
    http: reqwest::Client,
    deepseek: RwLock<Arc<DeepSeekAdapter>>,
    claude: ClaudeAdapter,
    ollama: RwLock<Arc<OllamaAdapter>>,
    local_models: RwLock<Vec<String>>,
    cloud_models: RwLock<Vec<String>>,
}

impl AiService {
    /// Build the service and its own HTTP client from settings.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(http, settings))
    }

    /// Build the service around an injected HTTP client.
    pub fn with_client(http: reqwest::Client, settings: &Settings) -> Self {
        let resolved = settings.resolve();
        Self {
            deepseek: RwLock::new(Arc::new(DeepSeekAdapter::new(
                http.clone(),
                resolved.deepseek_api_key,
                resolved.deepseek_api_url,
            ))),
            claude: ClaudeAdapter::new(http.clone(), resolved.claude_api_key),
            ollama: RwLock::new(Arc::new(OllamaAdapter::new(http.clone(), resolved.ollama_url))),
            local_models: RwLock::new(Vec::new()),
            cloud_models: RwLock::new(Vec::new()),
            http,
        }
    }

    // Clone the Arc out so no lock is held across an await.
    fn deepseek_adapter(&self) -> Arc<DeepSeekAdapter> {
        self.deepseek.read().clone()
    }

    fn ollama_adapter(&self) -> Arc<OllamaAdapter> {
        self.ollama.read().clone()
    }

    /// Single-shot generation, routed by model identifier.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(model, "dispatching generation request");
        match route(model)? {
            Route::DeepSeek => {
                self.deepseek_adapter()
                    .generate(GenerationRequest::new(model, prompt))
                    .await
            }
            Route::Claude => {
                self.claude
                    .generate(GenerationRequest::new(model, prompt))
                    .await
            }
            Route::Ollama(local) => {
                self.ollama_adapter()
                    .generate(GenerationRequest::new(local, prompt))
                    .await
            }
        }
    }

    /// Streaming generation. Only DeepSeek and Ollama stream; anything else
    /// is refused before any network call.
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<ChunkStream, ProviderError> {
        tracing::debug!(model, "dispatching streaming request");
        match route(model)? {
            Route::DeepSeek => {
                self.deepseek_adapter()
                    .generate_stream(GenerationRequest::new(model, prompt))
                    .await
            }
            Route::Claude => {
                self.claude
                    .generate_stream(GenerationRequest::new(model, prompt))
                    .await
            }
            Route::Ollama(local) => {
                self.ollama_adapter()
                    .generate_stream(GenerationRequest::new(local, prompt))
                    .await
            }
        }
    }

    /// Cached local catalog (empty until the first refresh).
    pub fn local_models(&self) -> Vec<String> {
        self.local_models.read().clone()
    }

    /// Cached cloud catalog (empty until the first refresh).
    pub fn cloud_models(&self) -> Vec<String> {
        self.cloud_models.read().clone()
    }

    /// The fixed Claude catalog; kept apart from the discovered cloud
    /// catalog so an unconfigured DeepSeek key leaves that one honestly
    /// empty.
    pub async fn claude_models(&self) -> Vec<String> {
        self.claude.list_models().await.unwrap_or_default()
    }

    /// Re-discover local models, optionally pointing the adapter at a new
    /// server first. A failed refresh clears the cache before propagating.
    pub async fn refresh_local_models(
        &self,
        url_override: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        if let Some(url) = url_override {
            *self.ollama.write() =
                Arc::new(OllamaAdapter::new(self.http.clone(), url.to_string()));
        }

        let adapter = self.ollama_adapter();
        match adapter.list_models().await {
            Ok(models) => {
                *self.local_models.write() = models.clone();
                Ok(models)
            }
            Err(e) => {
                self.local_models.write().clear();
                Err(e)
            }
        }
    }

    /// Re-discover cloud models. Same cache contract as the local refresh.
    pub async fn refresh_cloud_models(&self) -> Result<Vec<String>, ProviderError> {
        let adapter = self.deepseek_adapter();
        match adapter.list_models().await {
            Ok(models) => {
                *self.cloud_models.write() = models.clone();
                Ok(models)
            }
            Err(e) => {
                self.cloud_models.write().clear();
                Err(e)
            }
        }
    }

    /// Swap in a freshly built DeepSeek adapter. In-flight requests keep the
    /// adapter value they already captured.
    pub fn update_cloud_config(&self, url: &str, key: &str) {
        *self.deepseek.write() = Arc::new(DeepSeekAdapter::new(
            self.http.clone(),
            key.to_string(),
            url.to_string(),
        ));
    }
}
