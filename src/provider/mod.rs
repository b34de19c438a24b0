//! Provider adapters.
//!
//! One module per backend, all implementing [`ProviderAdapter`]. The set is
//! closed: a new backend is a new module plus a routing arm in
//! `service.rs`, never a runtime type probe.

pub mod claude;
pub mod deepseek;
pub mod ollama;

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use crate::error::ProviderError;

/// A lazy, finite, single-consumer sequence of response fragments.
///
/// Fragments arrive in network order and are never retracted; a mid-stream
/// transport failure surfaces as one `Err` item, after which the stream ends.
pub type ChunkStream = BoxStream<'static, Result<String, ProviderError>>;

/// One generation call: which model, what prompt. Single-use.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// The uniform contract every model backend implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// One blocking round trip; the whole answer as a single string.
    async fn generate(&self, req: GenerationRequest) -> Result<String, ProviderError>;

    /// Incremental generation. Providers without a streaming API keep the
    /// default, which refuses the model outright.
    async fn generate_stream(&self, req: GenerationRequest) -> Result<ChunkStream, ProviderError> {
        Err(ProviderError::UnsupportedModel(req.model))
    }

    /// Discovered (or, for providers without a discovery endpoint, fixed)
    /// model names. Missing credentials or a failed discovery call yield an
    /// empty list, not an error.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}
