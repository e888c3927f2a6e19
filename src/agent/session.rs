//! Multi-turn conversation with the agent.

use super::runner::{user_message, Agent, AgentResponse};
use crate::error::Result;
use async_openai::types::ChatCompletionRequestMessage;
use tracing::debug;

/// Conversation state for the interactive mode.
pub struct ChatSession {
    agent: Agent,
    messages: Vec<ChatCompletionRequestMessage>,
    history_limit: usize,
}

impl ChatSession {
    /// Start a conversation holding only the system message.
    pub fn new(agent: Agent, history_limit: usize) -> Result<Self> {
        let system = agent.system_message()?;
        Ok(Self {
            agent,
            messages: vec![system],
            history_limit: history_limit.max(2),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn messages(&self) -> &[ChatCompletionRequestMessage] {
        &self.messages
    }

    /// Clear conversation history (keeps system prompt).
    pub fn clear_history(&mut self) {
        self.messages.truncate(1);
    }

    /// Send one user turn and return the agent's response.
    ///
    /// On failure the turn is dropped from history.
    pub async fn send_message(&mut self, user_input: &str) -> Result<AgentResponse> {
        let mark = self.messages.len();
        self.messages.push(user_message(user_input)?);

        match self.agent.respond(&mut self.messages).await {
            Ok(response) => {
                self.trim_history();
                Ok(response)
            }
            Err(e) => {
                self.messages.truncate(mark);
                Err(e)
            }
        }
    }

    /// Drop the oldest turns once history exceeds the limit.
    ///
    /// Always cuts at a user message so tool outputs never lose the
    /// assistant message that requested them.
    fn trim_history(&mut self) {
        if self.messages.len() <= self.history_limit {
            return;
        }

        let min_start = self.messages.len() - (self.history_limit - 1);
        let is_user = |m: &ChatCompletionRequestMessage| {
            matches!(m, ChatCompletionRequestMessage::User(_))
        };
        let start = (min_start..self.messages.len())
            .find(|&i| is_user(&self.messages[i]))
            .or_else(|| self.messages.iter().rposition(is_user))
            .unwrap_or(1)
            .max(1);

        debug!("Trimming {} message(s) from history", start - 1);
        self.messages.drain(1..start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::{BigQueryToolset, ToolSettings};
    use crate::config::{BigQuerySettings, ConnectionProfile};
    use crate::testing::{FakeWarehouse, ScriptedModel};
    use std::sync::Arc;

    fn session(
        replies: Vec<crate::agent::ModelReply>,
        limit: usize,
    ) -> (ChatSession, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies));
        let profile =
            ConnectionProfile::new("acme-analytics", "fraud_data", "fraud_records", "US").unwrap();
        let tools = BigQueryToolset::new(
            Arc::new(FakeWarehouse::default().with_rows(1)),
            profile,
            ToolSettings::from(&BigQuerySettings::default()),
        );
        let agent = Agent::new(model.clone(), tools, "system");
        (ChatSession::new(agent, limit).unwrap(), model)
    }

    #[tokio::test]
    async fn test_history_carries_across_turns() {
        let (mut chat, model) = session(
            vec![ScriptedModel::answer("first"), ScriptedModel::answer("second")],
            30,
        );

        chat.send_message("one").await.unwrap();
        let response = chat.send_message("two").await.unwrap();
        assert_eq!(response.content, "second");

        // system, user, assistant, user, assistant
        assert_eq!(chat.messages().len(), 5);
        assert_eq!(model.calls()[1].len(), 4);
    }

    #[tokio::test]
    async fn test_clear_keeps_system_message() {
        let (mut chat, _) = session(vec![ScriptedModel::answer("ok")], 30);
        chat.send_message("hello").await.unwrap();
        chat.clear_history();
        assert_eq!(chat.messages().len(), 1);
        assert!(matches!(
            chat.messages()[0],
            ChatCompletionRequestMessage::System(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_turn_rolled_back() {
        let (mut chat, _) = session(vec![ScriptedModel::answer("ok")], 30);
        chat.send_message("hello").await.unwrap();
        // The script is exhausted, so this turn fails
        assert!(chat.send_message("again").await.is_err());
        assert_eq!(chat.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_trim_cuts_at_user_turn() {
        let (mut chat, _) = session(
            vec![
                ScriptedModel::answer("a"),
                ScriptedModel::tool_call("call_1", "execute_sql", r#"{"query": "SELECT 1"}"#),
                ScriptedModel::answer("b"),
                ScriptedModel::answer("c"),
            ],
            5,
        );

        chat.send_message("first").await.unwrap();
        chat.send_message("second").await.unwrap();
        // The first turn is dropped whole
        assert_eq!(chat.messages().len(), 5);
        assert!(matches!(chat.messages()[1], ChatCompletionRequestMessage::User(_)));

        chat.send_message("third").await.unwrap();
        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(!messages
            .iter()
            .any(|m| matches!(m, ChatCompletionRequestMessage::Tool(_))));
    }
}
