use std::time::Duration;

use thiserror::Error;

/// Always reported to the client as a tool-level result with `isError: true`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required argument: {0}")]
    MissingArgument(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("tool panicked: {0}")]
    Panicked(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
    #[error("tool name must not be empty")]
    EmptyName,
}

/// Fatal session faults. Everything else is answered on the wire.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read input: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write output: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}
