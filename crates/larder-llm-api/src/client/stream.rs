//! Incremental decoding of streamed response bodies.
//!
//! Network reads never line up with frame boundaries, so bytes are buffered
//! until a full line is available and only then handed to a backend-specific
//! [`FrameDecoder`]. Lines that do not parse as a frame are skipped.

use async_stream::stream;
use futures::Stream;
use futures_util::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::{ChatChunk, ChatStream, TokenUsage};
use crate::config::BackendType;
use crate::error::LlmError;

/// A decoded unit of a backend stream
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Incremental assistant text
    Delta(String),
    /// Terminal frame; some backends put trailing text on it
    Done {
        content: String,
        usage: Option<TokenUsage>,
    },
    /// Error envelope sent by the backend mid-stream
    Failed(String),
}

/// Backend-specific line decoder. May keep state across lines
/// (e.g. usage counters announced before the terminal event).
pub trait FrameDecoder {
    fn decode_line(&mut self, line: &str) -> Option<Frame>;
}

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(Self::to_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(Self::to_line(&raw))
    }

    fn to_line(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Line buffer plus decoder; pure, so it can be fed by hand in tests
pub struct FrameReader<D> {
    lines: LineBuffer,
    decoder: D,
}

impl<D: FrameDecoder> FrameReader<D> {
    pub fn new(decoder: D) -> Self {
        Self { lines: LineBuffer::default(), decoder }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let lines = self.lines.push(bytes);
        lines.iter().filter_map(|line| self.decode(line)).collect()
    }

    pub fn finish(&mut self) -> Vec<Frame> {
        match self.lines.finish() {
            Some(line) => self.decode(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn decode(&mut self, line: &str) -> Option<Frame> {
        if line.trim().is_empty() {
            return None;
        }
        self.decoder.decode_line(line)
    }
}

/// Strip the SSE `data:` field prefix
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|data| data.trim_start())
}

enum Read<B> {
    Bytes(B),
    End,
    Failed(String),
    Idle,
    Cancelled,
}

/// Turn a raw body stream into a [`ChatStream`].
///
/// Every read waits at most `idle_timeout`. The stream ends after the first
/// terminal frame; a body that ends without one still gets a final `done`
/// chunk so consumers always see exactly one.
pub fn decode_body<S, B, E, D>(
    body: S,
    decoder: D,
    backend: BackendType,
    idle_timeout: Duration,
    verbose: bool,
) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    D: FrameDecoder + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let chunks = stream! {
        let mut body = Box::pin(body);
        let mut reader = FrameReader::new(decoder);
        let mut frame_counter = 0usize;
        let mut finished = false;

        'read: loop {
            let read = tokio::select! {
                _ = token.cancelled() => Read::Cancelled,
                next = tokio::time::timeout(idle_timeout, body.next()) => match next {
                    Err(_) => Read::Idle,
                    Ok(None) => Read::End,
                    Ok(Some(Err(e))) => Read::Failed(e.to_string()),
                    Ok(Some(Ok(bytes))) => Read::Bytes(bytes),
                },
            };

            let at_end = matches!(read, Read::End);
            let frames = match read {
                Read::Bytes(bytes) => reader.push(bytes.as_ref()),
                Read::End => reader.finish(),
                Read::Cancelled => {
                    log::debug!("{} stream cancelled by consumer", backend);
                    return;
                }
                Read::Idle => {
                    yield Err(LlmError::StreamIdle { millis: idle_timeout.as_millis() as u64 });
                    return;
                }
                Read::Failed(message) => {
                    yield Err(LlmError::Transport { backend, message });
                    return;
                }
            };

            for frame in frames {
                frame_counter += 1;
                if verbose {
                    larder_logging::log_stream_chunk(frame_counter, &format!("{:?}", frame), verbose);
                }
                match frame {
                    Frame::Delta(text) => yield Ok(ChatChunk::delta(text)),
                    Frame::Done { content, usage } => {
                        finished = true;
                        yield Ok(ChatChunk::finished(content, usage));
                        break 'read;
                    }
                    Frame::Failed(message) => {
                        yield Err(LlmError::Provider { backend, status: 200, message });
                        return;
                    }
                }
            }

            if at_end {
                break;
            }
        }

        if !finished {
            log::debug!("{} stream ended without a terminal frame", backend);
            yield Ok(ChatChunk::finished("", None));
        }
    };

    ChatStream::new(Box::pin(chunks), cancel)
}
