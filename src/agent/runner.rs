//! Agent runner with tool calling loop.

use super::model::ChatModel;
use super::tools::{error_output, parse_tool_call, BigQueryToolset};
use crate::config::{DEFAULT_AGENT_NAME, DEFAULT_MAX_ITERATIONS};
use crate::error::{BqAgentError, Result};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Agent that answers questions about BigQuery data using tools.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: BigQueryToolset,
    name: String,
    instruction: String,
    max_iterations: usize,
}

impl Agent {
    /// Create an agent over the given model and toolset.
    pub fn new(model: Arc<dyn ChatModel>, tools: BigQueryToolset, instruction: &str) -> Self {
        Self {
            model,
            tools,
            name: DEFAULT_AGENT_NAME.to_string(),
            instruction: instruction.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn tools(&self) -> &BigQueryToolset {
        &self.tools
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The system message that opens every conversation.
    pub fn system_message(&self) -> Result<ChatCompletionRequestMessage> {
        Ok(ChatCompletionRequestSystemMessageArgs::default()
            .content(self.instruction.clone())
            .build()
            .map_err(|e| BqAgentError::Agent(e.to_string()))?
            .into())
    }

    /// Answer a single question in a fresh conversation.
    ///
    /// The question is passed to the model exactly as given.
    pub async fn run(&self, question: &str) -> Result<AgentResponse> {
        let mut messages = vec![self.system_message()?, user_message(question)?];
        self.respond(&mut messages).await
    }

    /// Continue a conversation whose last message is from the user.
    ///
    /// Tool calls, tool outputs and the final answer are appended to
    /// `messages`.
    pub async fn respond(
        &self,
        messages: &mut Vec<ChatCompletionRequestMessage>,
    ) -> Result<AgentResponse> {
        let definitions = self.tools.definitions();
        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(BqAgentError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);
            let reply = self.model.complete(messages.as_slice(), &definitions).await?;

            if reply.tool_calls.is_empty() {
                let content = reply.content.unwrap_or_default();
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(content.clone())
                        .build()
                        .map_err(|e| BqAgentError::Agent(e.to_string()))?
                        .into(),
                );
                return Ok(AgentResponse {
                    content,
                    tool_calls: tool_calls_made,
                    iterations,
                });
            }

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.tool_calls(reply.tool_calls.clone());
            if let Some(text) = reply.content.filter(|t| !t.is_empty()) {
                assistant.content(text);
            }
            messages.push(
                assistant
                    .build()
                    .map_err(|e| BqAgentError::Agent(e.to_string()))?
                    .into(),
            );

            for tool_call in &reply.tool_calls {
                let record = self.execute_tool_call(tool_call).await;

                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(&tool_call.id)
                        .content(record.result.clone())
                        .build()
                        .map_err(|e| BqAgentError::Agent(e.to_string()))?
                        .into(),
                );
                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    ///
    /// Failures become tool output so the model can react to them.
    async fn execute_tool_call(&self, tool_call: &ChatCompletionMessageToolCall) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        let outcome = match parse_tool_call(name, arguments) {
            Ok(tool) => self.tools.execute(&tool).await,
            Err(e) => Err(e),
        };
        let (result, success) = match outcome {
            Ok(output) => (output, true),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                (error_output(&e), false)
            }
        };

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
            success,
        }
    }
}

/// Build a user message.
pub(crate) fn user_message(text: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(text)
        .build()
        .map_err(|e| BqAgentError::Agent(e.to_string()))?
        .into())
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (model calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
    pub success: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
