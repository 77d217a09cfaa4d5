//! Model-backed agent.
//!
//! Each turn the agent renders the shared history as a chat transcript,
//! recalls relevant memories into its system prompt, and makes exactly one
//! provider call. The reply becomes a text message, a tool-call request, or
//! a handoff. Tools are never executed here; the dispatcher does that.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use crewloop_core::message::{Message, MessageKind, USER_SOURCE};
use crewloop_core::provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use crewloop_core::tool::ToolRegistry;
use tracing::{debug, warn};

/// Tool-name prefix the model uses to hand off.
pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant. \
Solve tasks using your tools. Reply with TERMINATE when the task has been completed.";

/// How many memories to recall and how close they must be.
#[derive(Debug, Clone, Copy)]
pub struct RecallPolicy {
    pub top_k: usize,
    pub score_threshold: f32,
}

impl Default for RecallPolicy {
    fn default() -> Self {
        Self {
            top_k: 3,
            score_threshold: 0.2,
        }
    }
}

/// An agent backed by a language model.
pub struct AssistantAgent {
    name: String,
    description: String,
    system_message: String,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Option<ToolRegistry>,
    handoffs: Vec<String>,
    memory: Vec<Arc<dyn MemoryBackend>>,
    recall: RecallPolicy,
    reflect_on_tool_use: bool,
}

impl AssistantAgent {
    pub fn new(name: impl Into<String>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "An agent that provides assistance with ability to use tools.".into(),
            system_message: DEFAULT_SYSTEM_MESSAGE.into(),
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools: None,
            handoffs: Vec::new(),
            memory: Vec::new(),
            recall: RecallPolicy::default(),
            reflect_on_tool_use: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = (!tools.is_empty()).then_some(tools);
        self
    }

    pub fn with_handoffs(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.handoffs = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Add a memory source. Every source is queried before each model call.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.memory.push(memory);
        self
    }

    pub fn with_recall(mut self, recall: RecallPolicy) -> Self {
        self.recall = recall;
        self
    }

    pub fn with_reflect_on_tool_use(mut self, reflect: bool) -> Self {
        self.reflect_on_tool_use = reflect;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Query every memory source with the latest message from someone else.
    /// Matches from all sources are merged best-first.
    async fn recall_memories(&self, history: &[Message]) -> Vec<MemoryEntry> {
        if self.memory.is_empty() {
            return vec![];
        }
        let Some(query_text) = history
            .iter()
            .rev()
            .find(|m| m.is_text() && m.source != self.name)
            .map(|m| m.content.clone())
        else {
            return vec![];
        };

        let mut recalled = Vec::new();
        for backend in &self.memory {
            let query = MemoryQuery::new(query_text.clone())
                .with_top_k(self.recall.top_k)
                .with_score_threshold(self.recall.score_threshold);
            match backend.query(query).await {
                Ok(entries) => recalled.extend(entries),
                Err(e) => warn!(agent = %self.name, memory = backend.name(), error = %e, "Memory recall failed"),
            }
        }
        recalled.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        if !recalled.is_empty() {
            debug!(agent = %self.name, count = recalled.len(), "Recalled memories for context");
        }
        recalled
    }

    fn format_memory_context(memories: &[MemoryEntry]) -> String {
        if memories.is_empty() {
            return String::new();
        }

        let mut ctx = String::from("\n\n## Recalled Memories\n");
        for (i, mem) in memories.iter().enumerate() {
            ctx.push_str(&format!("{}. [score={:.2}] {}\n", i + 1, mem.score, mem.content));
        }
        ctx
    }

    /// Render the shared history from this agent's point of view.
    pub fn to_chat_messages(&self, system_prompt: &str, history: &[Message]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(system_prompt)];
        let mut i = 0;
        while i < history.len() {
            let message = &history[i];
            let own = message.source == self.name;
            match message.kind {
                MessageKind::ToolCallRequest if own => {
                    // Only replay a request together with its results.
                    if let Some(next) = history.get(i + 1)
                        && next.kind == MessageKind::ToolCallResult
                        && next.source == self.name
                    {
                        messages.push(ChatMessage::assistant_tool_calls(
                            &message.content,
                            message.tool_calls.clone(),
                        ));
                        for result in &next.tool_results {
                            messages.push(ChatMessage::tool(&result.call_id, &result.output));
                        }
                        i += 2;
                        continue;
                    }
                    if !message.content.is_empty() {
                        messages.push(ChatMessage::assistant(&message.content));
                    }
                }
                MessageKind::ToolCallResult if own => {
                    messages.push(ChatMessage::user(format!("Tool results:\n{}", message.content)));
                }
                MessageKind::BackendError => {}
                _ if own => messages.push(ChatMessage::assistant(&message.content)),
                MessageKind::ToolCallRequest => {}
                _ if message.source == USER_SOURCE => {
                    messages.push(ChatMessage::user(&message.content));
                }
                _ => messages.push(ChatMessage::user(format!(
                    "{}: {}",
                    message.source, message.content
                ))),
            }
            i += 1;
        }
        messages
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self
            .tools
            .as_ref()
            .map(ToolRegistry::definitions)
            .unwrap_or_default();
        definitions.extend(self.handoffs.iter().map(|target| ToolDefinition {
            name: format!("{HANDOFF_TOOL_PREFIX}{target}"),
            description: format!("Hand the conversation off to {target}."),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }));
        definitions
    }

    fn interpret(&self, response: ProviderResponse) -> Message {
        let handoff = response
            .tool_calls
            .iter()
            .find_map(|call| call.name.strip_prefix(HANDOFF_TOOL_PREFIX));
        if let Some(target) = handoff {
            let content = if response.content.trim().is_empty() {
                format!("Handing off to {target}.")
            } else {
                response.content.clone()
            };
            return Message::handoff(&self.name, target, content).with_usage(response.usage);
        }

        if response.tool_calls.is_empty() {
            Message::text(&self.name, response.content).with_usage(response.usage)
        } else {
            Message::tool_call_request(&self.name, response.content, response.tool_calls)
                .with_usage(response.usage)
        }
    }
}

#[async_trait]
impl Agent for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn handoffs(&self) -> &[String] {
        &self.handoffs
    }

    fn tools(&self) -> Option<&ToolRegistry> {
        self.tools.as_ref()
    }

    fn reflects_on_tool_use(&self) -> bool {
        self.reflect_on_tool_use
    }

    async fn act(&self, history: &[Message]) -> Message {
        let recalled = self.recall_memories(history).await;
        let system_prompt = format!(
            "{}{}",
            self.system_message,
            Self::format_memory_context(&recalled)
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: self.to_chat_messages(&system_prompt, history),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tool_definitions(),
        };

        debug!(agent = %self.name, model = %self.model, messages = request.messages.len(), "Calling provider");
        match self.provider.complete(request).await {
            Ok(response) => self.interpret(response),
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Backend call failed");
                Message::backend_error(&self.name, e)
            }
        }
    }
}
