//! File write tool: write reports and other artifacts with path validation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crewloop_core::error::ToolError;
use crewloop_core::tool::Tool;
use tracing::debug;

use crate::path_policy::{default_forbidden, validate_path};

pub struct FileWriteTool {
    /// Relative paths resolve against this directory. `None` = current dir.
    base_dir: Option<PathBuf>,
    /// Allowed root directories. Empty = allow all.
    allowed_roots: Vec<PathBuf>,
    /// Forbidden path prefixes.
    forbidden_paths: Vec<String>,
}

impl FileWriteTool {
    /// Create a file write tool with the default forbidden prefixes.
    pub fn new() -> Self {
        Self {
            base_dir: None,
            allowed_roots: Vec::new(),
            forbidden_paths: default_forbidden(),
        }
    }

    /// Confine writes to `dir`, and resolve relative paths against it.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            base_dir: Some(dir.clone()),
            allowed_roots: vec![dir],
            forbidden_paths: default_forbidden(),
        }
    }

    /// Create a file write tool with explicit path restrictions.
    pub fn with_restrictions(allowed_roots: Vec<PathBuf>, forbidden_paths: Vec<String>) -> Self {
        Self {
            base_dir: None,
            allowed_roots,
            forbidden_paths,
        }
    }

    fn target(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and any missing parent directories; overwrites an existing file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let target = validate_path(&self.target(path), &self.allowed_roots, &self.forbidden_paths)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: "file_write".into(),
                reason: e.to_string(),
            })?;

        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(ToolError::ExecutionFailed {
                tool_name: "file_write".into(),
                reason: format!("Failed to create directory: {e}"),
            });
        }

        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_write".into(),
                reason: format!("Failed to write file: {e}"),
            })?;

        debug!(path = %target.display(), bytes = content.len(), "File written");
        Ok(format!("Successfully wrote {} bytes to {path}", content.len()))
    }
}
