//! Built-in tool implementations for crewloop.
//!
//! Tools give agents the ability to act outside the conversation: write a
//! report to disk, or look facts up in a memory store. Team files name tools
//! by string; [`build_registry`] resolves those names.

pub mod file_write;
pub mod memory_search;
pub mod path_policy;

use std::path::PathBuf;
use std::sync::Arc;

use crewloop_core::error::ToolError;
use crewloop_core::memory::MemoryBackend;
use crewloop_core::tool::ToolRegistry;

pub use file_write::FileWriteTool;
pub use memory_search::MemorySearchTool;

/// Names accepted by [`build_registry`].
pub const BUILTIN_TOOLS: &[&str] = &["file_write", "memory_search"];

/// Shared resources the built-in tools draw on.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Backing store for `memory_search`
    pub memory: Option<Arc<dyn MemoryBackend>>,
    /// Root for `file_write`; unrestricted (minus forbidden prefixes) when unset
    pub output_dir: Option<PathBuf>,
    /// Minimum score for `memory_search` hits
    pub score_threshold: f32,
}

/// Build a registry holding the named built-in tools.
///
/// Fails with `ToolError::NotFound` for an unknown name, and with
/// `ToolError::InvalidArguments` when `memory_search` is requested without
/// a memory store.
pub fn build_registry(names: &[String], ctx: &ToolContext) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    for name in names {
        match name.as_str() {
            "file_write" => {
                let tool = match &ctx.output_dir {
                    Some(dir) => FileWriteTool::rooted_at(dir),
                    None => FileWriteTool::new(),
                };
                registry.register(Arc::new(tool));
            }
            "memory_search" => {
                let backend = ctx.memory.clone().ok_or_else(|| {
                    ToolError::InvalidArguments("memory_search needs a memory store".into())
                })?;
                registry.register(Arc::new(
                    MemorySearchTool::new(backend).with_score_threshold(ctx.score_threshold),
                ));
            }
            other => return Err(ToolError::NotFound(other.to_string())),
        }
    }
    Ok(registry)
}
