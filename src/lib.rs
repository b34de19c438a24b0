//! Multi-provider LLM chat core.
//!
//! Three HTTP backends — the DeepSeek chat-completions API (SSE streaming),
//! the Anthropic messages API (single-shot), and a local Ollama server
//! (NDJSON streaming) — behind one [`provider::ProviderAdapter`] contract,
//! routed by model identifier through [`service::AiService`]. The host
//! application (an editor extension UI) owns the service instance and
//! forwards stream chunks to whatever surface it renders.

pub mod config;
pub mod error;
pub mod flowchart;
pub mod paths;
pub mod provider;
pub mod service;
pub mod stream;

pub use config::Settings;
pub use error::ProviderError;
pub use flowchart::FlowchartGenerator;
pub use provider::{ChunkStream, GenerationRequest, ProviderAdapter};
pub use service::AiService;
