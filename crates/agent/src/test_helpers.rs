//! Shared test helpers: scripted providers, agents and selectors.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::error::{ProviderError, TeamError};
use crewloop_core::message::Message;
use crewloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use crewloop_core::tool::{ToolCall, ToolRegistry};

use crate::topology::{Candidate, SpeakerSelector};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses
/// provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Responses may include backend failures.
    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();

        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{count}, have {})",
                responses.len()
            );
        }

        requests.push(request);
        responses[count].clone()
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        tool_calls: Vec::new(),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        content: thought.into(),
        tool_calls,
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, args)
}

/// One scripted turn.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Handoff(String),
}

/// An agent that cycles through fixed replies.
pub struct ScriptedAgent {
    name: String,
    description: String,
    handoffs: Vec<String>,
    tools: Option<ToolRegistry>,
    reflect: bool,
    replies: Vec<Reply>,
    /// History length seen on each turn
    seen: Mutex<Vec<usize>>,
}

impl ScriptedAgent {
    pub fn new(name: &str, replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "ScriptedAgent needs at least one reply");
        Self {
            name: name.into(),
            description: String::new(),
            handoffs: Vec::new(),
            tools: None,
            reflect: false,
            replies,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(name: &str, text: &str) -> Self {
        Self::new(name, vec![Reply::Text(text.into())])
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_handoffs(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.handoffs = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn reflecting(mut self) -> Self {
        self.reflect = true;
        self
    }

    /// Number of times `act` ran.
    pub fn turns(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// History lengths observed, one per turn.
    pub fn seen(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
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
        self.reflect
    }

    async fn act(&self, history: &[Message]) -> Message {
        let turn = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(history.len());
            seen.len() - 1
        };
        match &self.replies[turn % self.replies.len()] {
            Reply::Text(text) => Message::text(&self.name, text),
            Reply::ToolCalls(calls) => Message::tool_call_request(&self.name, "", calls.clone()),
            Reply::Handoff(target) => {
                Message::handoff(&self.name, target, format!("Handing off to {target}"))
            }
        }
    }
}

/// A speaker selector that returns scripted answers, then fails.
pub struct ScriptedSelector {
    answers: Mutex<VecDeque<String>>,
    feedback: Mutex<Vec<Option<TeamError>>>,
}

impl ScriptedSelector {
    pub fn new(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.feedback.lock().unwrap().len()
    }

    /// Feedback passed on each call.
    pub fn feedback(&self) -> Vec<Option<TeamError>> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeakerSelector for ScriptedSelector {
    async fn select(
        &self,
        _history: &[Message],
        _candidates: &[Candidate],
        feedback: Option<&TeamError>,
    ) -> Result<String, ProviderError> {
        self.feedback.lock().unwrap().push(feedback.cloned());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("selector script exhausted".into()))
    }
}
