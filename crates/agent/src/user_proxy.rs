//! Human-backed agent.
//!
//! The proxy shows the latest message as a prompt and waits for a reply
//! from an injected input source. A failing input source is reported as a
//! backend-error message, like a failing model.
//!
//! In a swarm the proxy can declare handoff targets. Its reply is then sent
//! as a handoff to the first target, so control returns to the agents.

use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::message::Message;
use futures::future::BoxFuture;
use tracing::warn;

/// Async input source. Receives the prompt, returns the human's reply.
pub type InputFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

pub struct UserProxyAgent {
    name: String,
    description: String,
    handoffs: Vec<String>,
    input: InputFn,
}

impl UserProxyAgent {
    pub fn new(name: impl Into<String>, input: InputFn) -> Self {
        Self {
            name: name.into(),
            description: "A human user".into(),
            handoffs: Vec::new(),
            input,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_handoffs(mut self, targets: Vec<String>) -> Self {
        self.handoffs = targets;
        self
    }
}

#[async_trait]
impl Agent for UserProxyAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn handoffs(&self) -> &[String] {
        &self.handoffs
    }

    async fn act(&self, history: &[Message]) -> Message {
        let prompt = history
            .last()
            .map(|m| format!("{}: {}", m.source, m.content))
            .unwrap_or_default();
        match (self.input)(prompt).await {
            Ok(reply) => match self.handoffs.first() {
                Some(target) => Message::handoff(&self.name, target, reply.trim_end()),
                None => Message::text(&self.name, reply.trim_end()),
            },
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Input source failed");
                Message::backend_error(&self.name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewloop_core::message::MessageKind;
    use std::sync::Mutex;

    #[tokio::test]
    async fn replies_with_input() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = prompts.clone();
        let input: InputFn = Arc::new(move |prompt| {
            seen.lock().unwrap().push(prompt);
            Box::pin(async { Ok("Friday, please\n".to_string()) })
        });
        let proxy = UserProxyAgent::new("customer", input);

        let reply = proxy
            .act(&[Message::user("Book"), Message::text("flights", "Which day?")])
            .await;
        assert_eq!(reply.kind, MessageKind::Text);
        assert_eq!(reply.source, "customer");
        assert_eq!(reply.content, "Friday, please");
        assert_eq!(prompts.lock().unwrap()[0], "flights: Which day?");
    }

    #[tokio::test]
    async fn hands_back_to_first_target() {
        let input: InputFn = Arc::new(|_| Box::pin(async { Ok("LH123".to_string()) }));
        let proxy = UserProxyAgent::new("customer", input)
            .with_handoffs(vec!["refunds".into(), "desk".into()]);

        let reply = proxy.act(&[Message::text("refunds", "Flight number?")]).await;
        assert_eq!(reply.kind, MessageKind::Handoff);
        assert_eq!(reply.handoff_target.as_deref(), Some("refunds"));
        assert_eq!(reply.content, "LH123");
    }

    #[tokio::test]
    async fn input_failure_is_backend_error() {
        let input: InputFn = Arc::new(|_| Box::pin(async { Err("stdin closed".to_string()) }));
        let proxy = UserProxyAgent::new("customer", input);

        let reply = proxy.act(&[]).await;
        assert_eq!(reply.kind, MessageKind::BackendError);
        assert_eq!(reply.content, "Error: stdin closed");
    }
}
