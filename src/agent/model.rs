//! Chat model abstraction.

use crate::config::LlmSettings;
use crate::error::{BqAgentError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestMessage, ChatCompletionTool,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// One model turn: either a final answer or a batch of tool calls.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ChatCompletionMessageToolCall>,
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation, optionally offering tools.
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<ModelReply>;

    /// Model identifier, for display.
    fn name(&self) -> &str;
}

/// OpenAI-compatible chat model.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a model from the configured endpoint settings.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(
        skip(self, messages, tools),
        fields(model = %self.model, messages = messages.len())
    )]
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<ModelReply> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages.to_vec())
            .temperature(self.temperature);
        if !tools.is_empty() {
            args.tools(tools.to_vec());
        }
        let request = args.build().map_err(|e| BqAgentError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| BqAgentError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BqAgentError::Agent("No response from model".to_string()))?;

        let reply = ModelReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        };
        debug!(
            "Model replied with {} tool call(s)",
            reply.tool_calls.len()
        );
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
