//! Thin OpenAI chat wrapper for /ask and plain-text replies

use crate::config::{CHAT_MAX_TOKENS, CHAT_MODEL, CHAT_SYSTEM_PROMPT};
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("empty completion response")]
    EmptyResponse,
    #[error("request build error: {0}")]
    Request(String),
}

/// Single-shot chat client over the OpenAI API
pub struct ChatClient {
    client: Client<OpenAIConfig>,
}

impl ChatClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
        }
    }

    /// Ask for a single completion with the fixed system prompt
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be built, the API call
    /// fails, or the response carries no content.
    pub async fn reply(&self, user_message: &str) -> Result<String, LlmError> {
        debug!("Requesting chat completion ({} chars)", user_message.len());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(CHAT_SYSTEM_PROMPT)
                .build()
                .map_err(|e| LlmError::Request(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| LlmError::Request(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(CHAT_MODEL)
            .messages(messages)
            .max_tokens(CHAT_MAX_TOKENS)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
