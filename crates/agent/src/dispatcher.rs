//! Tool dispatch: executes the tool calls an agent requested.
//!
//! The dispatcher is the only place tools run. Every failure (unknown tool,
//! bad arguments, tool error, timeout) becomes an `"Error: ..."` result so
//! the requesting agent can react on its next turn; nothing propagates out.

use std::time::{Duration, Instant};

use crewloop_core::error::ToolError;
use crewloop_core::message::{Message, MessageKind};
use crewloop_core::tool::{ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, warn};

use crate::validation::validate_arguments;

/// Executes tool-call requests against the requesting agent's registry.
#[derive(Debug, Clone, Default)]
pub struct ToolDispatcher {
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every tool invocation. An expired call yields `ToolError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Execute every call in a tool-call request, in order, and return the
    /// tool-call result message. `source` is the requesting agent.
    pub async fn execute(
        &self,
        source: &str,
        tools: Option<&ToolRegistry>,
        request: &Message,
    ) -> Message {
        debug_assert_eq!(request.kind, MessageKind::ToolCallRequest);

        let mut results = Vec::with_capacity(request.tool_calls.len());
        for call in &request.tool_calls {
            let start = Instant::now();
            let result = match self.dispatch_one(tools, call).await {
                Ok(output) => ToolResult::ok(&call.id, &call.name, output),
                Err(e) => {
                    warn!(agent = %source, tool = %call.name, error = %e, "Tool call failed");
                    ToolResult::error(&call.id, &call.name, format!("Error: {e}"))
                }
            };
            debug!(
                agent = %source,
                tool = %call.name,
                success = result.success,
                duration_ms = start.elapsed().as_millis() as u64,
                "Tool call dispatched"
            );
            results.push(result);
        }

        Message::tool_call_result(source, results)
    }

    /// Look up, validate, and invoke a single call.
    pub async fn dispatch_one(
        &self,
        tools: Option<&ToolRegistry>,
        call: &ToolCall,
    ) -> Result<String, ToolError> {
        let tool = tools
            .and_then(|registry| registry.get(&call.name))
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        validate_arguments(&call.arguments, &tool.parameters_schema())
            .map_err(|reason| ToolError::InvalidArguments(format!("{}: {reason}", call.name)))?;

        let invocation = tool.execute(call.arguments.clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: limit.as_secs(),
                })?,
            None => invocation.await,
        }
    }
}
