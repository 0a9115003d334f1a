use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use toolwire_core::{ProtocolHandler, ServerInfo, Session, SessionSummary};

use crate::config::ServerConfig;
use crate::tools::build_registry;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_handler(config: &ServerConfig) -> anyhow::Result<ProtocolHandler> {
    let registry = build_registry(config)?;
    info!(tools = registry.len(), "tool registry built");

    let server_info = ServerInfo {
        name: config.server_name.clone(),
        version: SERVER_VERSION.to_string(),
    };
    Ok(ProtocolHandler::new(server_info, Arc::new(registry)))
}

/// Serves one session over `reader`/`writer` until the input closes.
pub async fn serve<R, W>(
    config: &ServerConfig,
    reader: R,
    writer: W,
) -> anyhow::Result<SessionSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let handler = Arc::new(build_handler(config)?);
    let summary = Session::new(reader, writer, handler)
        .with_pipeline_depth(config.pipeline_depth)
        .run()
        .await?;
    Ok(summary)
}
