//! External collaborators of the query pipeline.
//!
//! - `Embedder`: text to a fixed-length vector
//! - `Generator`: prompt to answer text
//!
//! The HTTP implementations in `openai` speak the OpenAI-compatible API,
//! which covers OpenAI itself as well as most self-hosted gateways.

pub mod openai;

use async_trait::async_trait;

pub use openai::{OpenAiEmbedder, OpenAiGenerator};

/// Errors raised by embedding and generation providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `text`. An empty vector means the provider had nothing to embed.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
