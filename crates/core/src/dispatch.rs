use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::ToolError;
use crate::jsonrpc::CallToolResult;
use crate::registry::{ToolOutput, ToolRegistry};

/// Result of dispatching one tool call.
#[derive(Debug)]
pub enum Outcome {
    Completed(ToolOutput),
    UnknownTool(String),
    Failed(ToolError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Unknown tools and handler failures share the `isError` channel.
    pub fn into_call_result(self) -> CallToolResult {
        match self {
            Self::Completed(output) => CallToolResult::success(output.content),
            Self::UnknownTool(name) => CallToolResult::failure(format!("Unknown tool: {}", name)),
            Self::Failed(err) => CallToolResult::failure(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, arguments: Value) -> Outcome {
        let Some(tool) = self.registry.lookup(name) else {
            warn!(tool = %name, "unknown tool");
            return Outcome::UnknownTool(name.to_string());
        };

        let arguments = match tool.descriptor.input_schema.validate(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %name, error = %e, "rejected tool arguments");
                return Outcome::Failed(e);
            }
        };

        let started = Instant::now();
        let result = AssertUnwindSafe(tool.handler.call(arguments))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                debug!(tool = %name, elapsed_ms, "tool completed");
                Outcome::Completed(output)
            }
            Ok(Err(e)) => {
                warn!(tool = %name, elapsed_ms, error = %e, "tool failed");
                Outcome::Failed(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tool = %name, panic = %message, "tool panicked");
                Outcome::Failed(ToolError::Panicked(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
