pub mod dispatch;
pub mod error;
pub mod frame;
pub mod jsonrpc;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;

pub use dispatch::{Dispatcher, Outcome};
pub use error::{RegistryError, SessionError, ToolError};
pub use frame::{FrameReader, FrameStream};
pub use jsonrpc::{
    CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerInfo, ToolContent,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
pub use protocol::{Method, ProtocolHandler};
pub use registry::{
    handler_fn, FnHandler, RegisteredTool, ToolDescriptor, ToolHandler, ToolOutput, ToolRegistry,
    ToolRegistryBuilder,
};
pub use schema::{InputSchema, Property, PropertyType};
pub use session::{Session, SessionSummary, DEFAULT_PIPELINE_DEPTH};
