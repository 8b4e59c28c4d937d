//! Incremental parser for chat-completion event streams.
//!
//! The upstream frames its reply as newline-terminated `data: <json>` lines
//! ending with `data: [DONE]`. Parsing is split in two layers so either can
//! be exercised with literal bytes:
//! - [`LineSplitter`] turns arbitrary byte chunks into whole lines
//! - [`parse_line`] classifies one line as skip / done / text delta

use crate::llm_driver::{LlmError, StreamEnd, StreamEvent};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Prefix of every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// End-of-stream marker line.
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// Splits a byte stream into lines on `\n`.
///
/// Bytes are buffered until a full line is available, so a multi-byte UTF-8
/// character split across chunks decodes intact. An unterminated tail is
/// never yielded.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without the `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            lines.push(String::from_utf8_lossy(&self.buf[start..end]).into_owned());
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Bytes held back waiting for a `\n`.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// One parsed `data:` payload: `{choices: [{delta: {content}}]}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl UpstreamChunk {
    /// The first choice's content fragment, if non-empty.
    pub fn into_fragment(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}

/// Classification of one event-stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Blank, malformed, or content-free; produces nothing.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
    /// A non-empty text fragment.
    Delta(String),
}

/// Classify a single line.
///
/// Malformed JSON is expected (partial chunks, keep-alives, `event:` lines)
/// and is skipped without error.
pub fn parse_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }
    if line == DONE_SENTINEL {
        return LineEvent::Done;
    }

    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    match serde_json::from_str::<UpstreamChunk>(payload) {
        Ok(chunk) => chunk
            .into_fragment()
            .map(LineEvent::Delta)
            .unwrap_or(LineEvent::Skip),
        Err(e) => {
            trace!(error = %e, "Skipping unparseable event-stream line");
            LineEvent::Skip
        }
    }
}

/// Drain a streamed body, sending each text delta to `tx` in order.
///
/// Returns when the sentinel is seen or the body ends. Bytes after the last
/// `\n` are discarded at end of body. A body read error
/// aborts with [`LlmError::Stream`]; deltas already sent stay sent. A closed
/// receiver does not stop the drain.
pub async fn drain_event_stream<S, E>(
    body: S,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<StreamEnd, LlmError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut splitter = LineSplitter::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;
        for line in splitter.push(&chunk) {
            if forward_line(&line, tx).await {
                return Ok(StreamEnd::Done);
            }
        }
    }

    if splitter.pending() > 0 {
        debug!(bytes = splitter.pending(), "Dropping unterminated line at end of body");
    }
    Ok(StreamEnd::Eof)
}

/// Returns `true` on the sentinel.
async fn forward_line(line: &str, tx: &mpsc::Sender<StreamEvent>) -> bool {
    match parse_line(line) {
        LineEvent::Skip => false,
        LineEvent::Done => true,
        LineEvent::Delta(text) => {
            let _ = tx.send(StreamEvent::TextDelta { text }).await;
            false
        }
    }
}
