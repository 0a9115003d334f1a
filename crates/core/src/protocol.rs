use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::jsonrpc::{
    CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities,
    ServerInfo, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::registry::ToolRegistry;

/// Methods this server answers. Anything else is `-32601`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    ToolsList,
    ToolsCall,
    Ping,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::Ping => "ping",
        }
    }
}

/// Turns one frame into exactly one response.
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    server_info: ServerInfo,
    dispatcher: Dispatcher,
}

impl ProtocolHandler {
    pub fn new(server_info: ServerInfo, registry: Arc<ToolRegistry>) -> Self {
        Self {
            server_info,
            dispatcher: Dispatcher::new(registry),
        }
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub async fn handle_frame(&self, frame: &str) -> JsonRpcResponse {
        let object = match serde_json::from_str::<Value>(frame) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                warn!(len = frame.len(), "frame is not a JSON object");
                return JsonRpcResponse::error(None, PARSE_ERROR, "Parse error");
            }
            Err(e) => {
                warn!(error = %e, len = frame.len(), "failed to parse frame");
                return JsonRpcResponse::error(None, PARSE_ERROR, "Parse error");
            }
        };

        match JsonRpcRequest::from_object(object) {
            Ok(request) => self.handle_request(request).await,
            Err(id) => {
                warn!(id = ?id, "request has no method name");
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    "Method not found: missing method name",
                )
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, id = ?request.id, "received request");

        let Some(method) = Method::parse(&request.method) else {
            return JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            );
        };

        match method {
            Method::Initialize => JsonRpcResponse::success(request.id, json!(self.initialize())),
            Method::ToolsList => {
                let tools = self.dispatcher.registry().list();
                JsonRpcResponse::success(request.id, json!({ "tools": tools }))
            }
            Method::ToolsCall => {
                let result = self.call_tool(request.params).await;
                JsonRpcResponse::success(request.id, json!(result))
            }
            Method::Ping => JsonRpcResponse::success(request.id, json!({})),
        }
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: self.server_info.clone(),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> CallToolResult {
        let params = params.unwrap_or(Value::Null);

        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return CallToolResult::failure("Missing required parameter: name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        self.dispatcher
            .dispatch(name, arguments)
            .await
            .into_call_result()
    }
}
