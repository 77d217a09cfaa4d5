//! # crewloop Core
//!
//! Domain types, traits, and error definitions for the crewloop multi-agent
//! orchestrator. This crate has **no runtime dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each collaborator the orchestrator talks to is a trait here:
//! - [`Provider`]: the language-model backend
//! - [`Tool`]: an external side-effecting capability
//! - [`MemoryBackend`]: a similarity-searchable memory store
//! - [`Agent`]: a participant that produces one message per turn
//!
//! Implementations live in their own crates, so tests can swap in scripted
//! stand-ins without touching the run loop.

pub mod agent;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::Agent;
pub use error::{Error, Result};
pub use memory::{MemoryBackend, MemoryEntry, MemoryQuery};
pub use message::{History, Message, MessageKind, USER_SOURCE};
pub use provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, Role, ToolDefinition};
pub use tool::{FnTool, Tool, ToolCall, ToolRegistry, ToolResult};
