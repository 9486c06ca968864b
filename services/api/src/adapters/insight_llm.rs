//! services/api/src/adapters/insight_llm.rs
//!
//! This module contains the adapter for the weekly insight writer.
//! It implements the `InsightSummarizer` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use lorelog_core::ports::{InsightSummarizer, PortError, PortResult};

const SYSTEM_PROMPT: &str = "You write insights for a reading log. From the bullet summary you are given, \
describe in three or four lines what the reader learned and which interests stood out that week. \
Keep the tone relaxed but readable as a business note.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightSummarizer` using an OpenAI chat model.
#[derive(Clone)]
pub struct OpenAiInsightAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiInsightAdapter {
    /// Creates a new `OpenAiInsightAdapter`.
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `InsightSummarizer` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightSummarizer for OpenAiInsightAdapter {
    async fn summarize(&self, bullet_text: &str) -> PortResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PortError::Unavailable("OPENAI_API_KEY is not set".to_string()))?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(bullet_text)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| PortError::Unexpected("No insight summary generated".to_string()))
    }
}
