//! Message and History domain types.
//!
//! These are the value objects that flow through a run:
//! the caller submits a task → agents reply → tools report back → the
//! termination condition reads the result. A `Message` never changes after
//! it is appended; a `History` only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Usage;
use crate::tool::{ToolCall, ToolResult};

/// Source name used for messages that come from outside the team.
pub const USER_SOURCE: &str = "user";

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A plain text reply (or the task itself)
    Text,
    /// The agent asks for one or more tools to be executed
    ToolCallRequest,
    /// Results of executing a tool-call request
    ToolCallResult,
    /// The agent transfers the active-speaker role to another participant
    Handoff,
    /// The agent's backend failed; the content describes the failure
    BackendError,
}

/// A single message in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Agent name, or [`USER_SOURCE`] for the task
    pub source: String,

    /// What kind of message this is
    pub kind: MessageKind,

    /// The text content
    pub content: String,

    /// Tool calls requested (only for `ToolCallRequest`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool results (only for `ToolCallResult`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,

    /// Handoff target (only for `Handoff`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_target: Option<String>,

    /// Token usage of the backend call that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn build(source: impl Into<String>, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            kind,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            handoff_target: None,
            usage: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a task message from the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(USER_SOURCE, MessageKind::Text, content)
    }

    /// Create a plain text reply from an agent.
    pub fn text(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(source, MessageKind::Text, content)
    }

    /// Create a tool-call request.
    pub fn tool_call_request(
        source: impl Into<String>,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let mut msg = Self::build(source, MessageKind::ToolCallRequest, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool-call result. The content joins every output so text-only
    /// consumers still see what happened.
    pub fn tool_call_result(source: impl Into<String>, tool_results: Vec<ToolResult>) -> Self {
        let content = tool_results
            .iter()
            .map(|r| r.output.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut msg = Self::build(source, MessageKind::ToolCallResult, content);
        msg.tool_results = tool_results;
        msg
    }

    /// Create a handoff to `target`.
    pub fn handoff(
        source: impl Into<String>,
        target: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::build(source, MessageKind::Handoff, content);
        msg.handoff_target = Some(target.into());
        msg
    }

    /// Create a message describing a backend failure.
    pub fn backend_error(source: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::build(source, MessageKind::BackendError, format!("Error: {error}"))
    }

    /// Attach token usage.
    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    /// Whether this is a plain text message.
    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }
}

/// The append-only ordered sequence of messages shared within one run.
///
/// There are no mutable accessors: the only way to change a `History` is
/// [`History::push`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a history from previously recorded messages (multi-turn mode).
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended at or after `start`.
    pub fn since(&self, start: usize) -> &[Message] {
        &self.messages[start.min(self.messages.len())..]
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Write a haiku");
        assert_eq!(msg.source, USER_SOURCE);
        assert_eq!(msg.kind, MessageKind::Text);
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_result_content_joins_outputs() {
        let msg = Message::tool_call_result(
            "researcher",
            vec![
                ToolResult::ok("c1", "search", "first"),
                ToolResult::error("c2", "scrape", "Error: boom"),
            ],
        );
        assert_eq!(msg.kind, MessageKind::ToolCallResult);
        assert_eq!(msg.content, "first\nError: boom");
        assert_eq!(msg.tool_results.len(), 2);
    }

    #[test]
    fn backend_error_uses_error_prefix() {
        let msg = Message::backend_error("coder", "connection refused");
        assert_eq!(msg.kind, MessageKind::BackendError);
        assert_eq!(msg.content, "Error: connection refused");
    }

    #[test]
    fn history_since_clamps_out_of_range_start() {
        let mut history = History::new();
        history.push(Message::user("one"));
        history.push(Message::text("a", "two"));
        assert_eq!(history.since(1).len(), 1);
        assert!(history.since(10).is_empty());
    }

    #[test]
    fn history_serializes_as_plain_list() {
        let mut history = History::new();
        history.push(Message::user("task"));
        history.push(Message::handoff("analyst", "strategist", "over to you"));

        let json = serde_json::to_string(&history).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains(r#""kind":"handoff""#));

        let restored: History = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.messages()[1].handoff_target.as_deref(),
            Some("strategist")
        );
    }
}
