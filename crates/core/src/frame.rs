//! Newline-delimited framing over an arbitrarily chunked byte stream.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

const READ_CHUNK: usize = 8 * 1024;

/// Re-assembles newline-terminated frames from byte chunks.
///
/// Bytes are buffered until a `\n` arrives; the unterminated tail is held
/// back for the next chunk. Blank and whitespace-only frames are dropped.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Only the new bytes can contain a terminator we have not seen yet.
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer[scan_from..]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|pos| scan_from + pos)
        else {
            return Vec::new();
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        complete
            .split(|&b| b == b'\n')
            .filter_map(decode_frame)
            .collect()
    }

    /// Bytes received after the most recent newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_frame(raw: &[u8]) -> Option<String> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// Pull-based frame source over an async reader.
pub struct FrameStream<R> {
    reader: R,
    frames: FrameReader,
    ready: VecDeque<String>,
    eof: bool,
}

impl<R> FrameStream<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames: FrameReader::new(),
            ready: VecDeque::new(),
            eof: false,
        }
    }

    /// Returns the next complete frame, or `None` once the reader is closed.
    ///
    /// Cancel-safe: a frame is never lost if the returned future is dropped
    /// before it resolves.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }

            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
                if self.frames.has_pending() {
                    debug!(
                        bytes = self.frames.pending().len(),
                        "input closed with an unterminated frame, discarding"
                    );
                }
                continue;
            }

            trace!(bytes = n, "read chunk");
            self.ready.extend(self.frames.push(&chunk[..n]));
        }
    }
}
