use std::sync::Arc;

use futures::stream::{FuturesOrdered, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, trace};

use crate::error::SessionError;
use crate::frame::FrameStream;
use crate::jsonrpc::JsonRpcResponse;
use crate::protocol::ProtocolHandler;

pub const DEFAULT_PIPELINE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub responses: u64,
}

pub struct Session<R, W> {
    frames: FrameStream<R>,
    writer: W,
    handler: Arc<ProtocolHandler>,
    pipeline_depth: usize,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, handler: Arc<ProtocolHandler>) -> Self {
        Self {
            frames: FrameStream::new(reader),
            writer,
            handler,
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
        }
    }

    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth.max(1);
        self
    }

    /// Runs until the input is closed and every pending response is written.
    pub async fn run(self) -> Result<SessionSummary, SessionError> {
        let Session {
            mut frames,
            mut writer,
            handler,
            pipeline_depth,
        } = self;

        info!(
            server = %handler.server_info().name,
            pipeline_depth,
            "session started"
        );

        let mut summary = SessionSummary::default();
        let mut read_error = None;
        let mut input_open = true;
        let mut pending = FuturesOrdered::new();

        loop {
            tokio::select! {
                biased;

                Some(response) = pending.next(), if !pending.is_empty() => {
                    write_response(&mut writer, &response).await?;
                    summary.responses += 1;
                }

                frame = frames.next_frame(), if input_open && pending.len() < pipeline_depth => {
                    match frame {
                        Ok(Some(frame)) => {
                            summary.frames += 1;
                            let handler = &handler;
                            pending.push_back(async move { handler.handle_frame(&frame).await });
                        }
                        Ok(None) => {
                            info!("input closed");
                            input_open = false;
                        }
                        Err(e) => {
                            error!(error = %e, "failed to read input");
                            read_error = Some(e);
                            input_open = false;
                        }
                    }
                }

                else => break,
            }
        }

        info!(
            frames = summary.frames,
            responses = summary.responses,
            "session finished"
        );

        match read_error {
            Some(e) => Err(SessionError::Read(e)),
            None => Ok(summary),
        }
    }
}

/// Writes one response as a single `JSON + \n` buffer and flushes it.
async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    trace!(len = line.len(), "writing response");

    writer.write_all(&line).await.map_err(SessionError::Write)?;
    writer.flush().await.map_err(SessionError::Write)
}
