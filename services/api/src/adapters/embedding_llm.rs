//! services/api/src/adapters/embedding_llm.rs
//!
//! This module contains the adapter for the embedding model.
//! It implements the `Embedder` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::CreateEmbeddingRequestArgs, Client,
};
use async_trait::async_trait;
use lorelog_core::ports::{Embedder, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `Embedder` using the OpenAI embeddings API.
///
/// Built without a client when no API key is configured; every call then
/// reports `PortError::Unavailable` so callers take their fallback path.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `Embedder` Trait Implementation
//=========================================================================================

#[async_trait]
impl Embedder for OpenAiEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PortError::Unavailable("OPENAI_API_KEY is not set".to_string()))?;

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| PortError::Unexpected("No embedding returned".to_string()))
    }
}
