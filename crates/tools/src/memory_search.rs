//! Memory search tool: lets the model query a memory store on demand.
//!
//! Agents with memory already get the best matches injected before each
//! model call. This tool is for the retriever pattern, where the model
//! decides when and what to look up.

use async_trait::async_trait;
use crewloop_core::error::ToolError;
use crewloop_core::memory::{MemoryBackend, MemoryQuery};
use crewloop_core::tool::Tool;
use std::sync::Arc;

/// A tool that searches a memory store.
pub struct MemorySearchTool {
    backend: Arc<dyn MemoryBackend>,
    score_threshold: f32,
}

impl MemorySearchTool {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            backend,
            score_threshold: 0.0,
        }
    }

    /// Drop matches scoring below `threshold`.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search stored knowledge for facts relevant to a query. \
         Use this when you need information you have not been given in the conversation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant memories"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of memories to return (default 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let limit = arguments["limit"].as_u64().unwrap_or(3).clamp(1, 50) as usize;

        let entries = self
            .backend
            .query(
                MemoryQuery::new(query)
                    .with_top_k(limit)
                    .with_score_threshold(self.score_threshold),
            )
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "memory_search".into(),
                reason: e.to_string(),
            })?;

        if entries.is_empty() {
            return Ok(format!("No memories found matching '{query}'."));
        }

        let results: Vec<MemoryResult> = entries
            .into_iter()
            .map(|e| MemoryResult {
                content: e.content,
                score: e.score,
                metadata: e.metadata,
            })
            .collect();

        serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "memory_search".into(),
            reason: e.to_string(),
        })
    }
}

#[derive(serde::Serialize)]
struct MemoryResult {
    content: String,
    score: f32,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    metadata: serde_json::Map<String, serde_json::Value>,
}
