//! Error types for the crewloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all crewloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Team / orchestration errors ---
    #[error("Team error: {0}")]
    Team(#[from] TeamError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

/// Structural misuse of the turn-taking protocol.
///
/// `EmptyTeam`, `DuplicateParticipant`, `ReservedName` and
/// `UnknownHandoffTarget` are raised while building a team, before any
/// message exists. `InvalidSelection` and `IllegalHandoff` come from agent
/// output during a run and are recovered by the topology strategies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeamError {
    #[error("A team needs at least one participant")]
    EmptyTeam,

    #[error("Duplicate participant name: {0}")]
    DuplicateParticipant(String),

    #[error("Participant name '{0}' is reserved for the task author")]
    ReservedName(String),

    #[error("Agent '{agent}' declares handoff to '{target}', which is not a participant")]
    UnknownHandoffTarget { agent: String, target: String },

    #[error("Selected speaker '{choice}' is not one of: {}", candidates.join(", "))]
    InvalidSelection { choice: String, candidates: Vec<String> },

    #[error("Agent '{from}' may not hand off to '{target}'")]
    IllegalHandoff { from: String, target: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "file_write".into(),
            reason: "path is forbidden".into(),
        });
        assert!(err.to_string().contains("file_write"));
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn invalid_selection_lists_candidates() {
        let err = TeamError::InvalidSelection {
            choice: "nobody".into(),
            candidates: vec!["coder".into(), "critic".into()],
        };
        let text = err.to_string();
        assert!(text.contains("nobody"));
        assert!(text.contains("coder, critic"));
    }

    #[test]
    fn team_error_converts_into_top_level() {
        let err: Error = TeamError::EmptyTeam.into();
        assert!(matches!(err, Error::Team(TeamError::EmptyTeam)));
    }
}
