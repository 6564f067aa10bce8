//! Trivia prompt generation through an OpenAI-compatible chat endpoint.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::PipelineError;

const SERVICE: &str = "Gemini";

/// Generates raw text from a prompt.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    /// Returns the generator's raw response text, unprocessed.
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Gemini reached through its OpenAI-compatible API.
pub struct GeminiScriptWriter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiScriptWriter {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self, PipelineError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ScriptWriter for GeminiScriptWriter {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "Prompt cannot be empty".to_string(),
            ));
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.to_string().into(),
                    name: None,
                },
            )])
            .build()?;

        tracing::debug!(model = %self.model, "requesting trivia prompts");
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| PipelineError::MalformedResponse {
                service: SERVICE,
                reason: "response contained no text".to_string(),
            })
    }
}
