//! Natural-language agent over BigQuery.
//!
//! An LLM answers questions by calling BigQuery tools scoped to the active
//! connection profile. [`Agent`] runs one question; [`ChatSession`] keeps
//! history across turns.

mod model;
mod runner;
mod session;
mod sql;
mod tools;

pub use model::{ChatModel, ModelReply, OpenAIChatModel};
pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use session::ChatSession;
pub use tools::{
    error_output, parse_tool_call, tool_definitions, BigQueryToolset, ToolCall, ToolSettings,
    TOOL_NAMES,
};
