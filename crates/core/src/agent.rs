//! The Agent trait: one participant in a team.

use async_trait::async_trait;

use crate::message::Message;
use crate::tool::ToolRegistry;

/// A participant that produces exactly one message per turn.
///
/// `act` reads the shared history and returns a new message; it never
/// mutates the history and never executes tools itself. A failing backend
/// is reported as a [`MessageKind::BackendError`](crate::MessageKind)
/// message, so `act` has no error path.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name within a team.
    fn name(&self) -> &str;

    /// Short description used by the selector to pick speakers.
    fn description(&self) -> &str {
        ""
    }

    /// Participants this agent may hand off to.
    fn handoffs(&self) -> &[String] {
        &[]
    }

    /// Tools this agent may request. The dispatcher only executes calls
    /// against the requesting agent's own registry.
    fn tools(&self) -> Option<&ToolRegistry> {
        None
    }

    /// Whether this agent speaks again right after its tool calls are
    /// dispatched, to summarize the results.
    fn reflects_on_tool_use(&self) -> bool {
        false
    }

    /// Produce the next message given the full history.
    async fn act(&self, history: &[Message]) -> Message;
}
