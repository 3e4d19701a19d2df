//! Upstream SSE relay (one assistant turn per relay)

use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::accumulator::{SlotMode, ToolCallAccumulator};
use super::sink::{send_json, EventSink, SinkError};
use super::upstream::ByteStream;
use crate::api::{Message, StreamChunk, ToolCallRecord};

/// Finish reason that hands control back for tool execution
pub const TOOL_CALLS_FINISH_REASON: &str = "tool_calls";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Upstream stream failed: {0}")]
    Upstream(#[from] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result of relaying one upstream stream
#[derive(Debug, Clone, Default)]
pub struct RelayOutcome {
    /// Content of the in-progress assistant message
    pub message: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub needs_tool_execution: bool,
    pub finish_reason: Option<String>,
    /// Chunks that counted toward classification
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnKind {
    Content,
    ToolCall,
}

impl TurnKind {
    fn of(chunk: &StreamChunk) -> Self {
        let has_tool_calls = chunk.choices.first().is_some_and(|c| c.delta.has_tool_calls());
        if has_tool_calls {
            TurnKind::ToolCall
        } else {
            TurnKind::Content
        }
    }
}

/// Content event sent to the client: upstream metadata, one content delta,
/// and the current search results
#[derive(Serialize)]
struct ContentEvent<'a> {
    id: &'a str,
    object: &'a str,
    created: i64,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_fingerprint: Option<&'a str>,
    choices: [ContentChoice<'a>; 1],
    #[serde(skip_serializing_if = "<[Message]>::is_empty")]
    search_results: &'a [Message],
}

#[derive(Serialize)]
struct ContentChoice<'a> {
    index: u32,
    delta: ContentDelta<'a>,
    finish_reason: Option<&'a str>,
}

#[derive(Serialize)]
struct ContentDelta<'a> {
    content: &'a str,
}

/// Consumes one upstream SSE body and reconstructs the assistant message.
///
/// The first chunk usually only announces the role, so the turn is classified
/// by the second counted chunk: tool-call fragments there make the whole turn
/// a tool-call turn, anything else makes it a content turn. The first chunk is
/// held back and replayed once the kind is known.
pub struct StreamRelay<'a> {
    search_context: &'a [Message],
    accumulator: ToolCallAccumulator,
    message: String,
    kind: Option<TurnKind>,
    held: Option<StreamChunk>,
    chunks: usize,
}

impl<'a> StreamRelay<'a> {
    pub fn new(slot_mode: SlotMode, search_context: &'a [Message]) -> Self {
        Self {
            search_context,
            accumulator: ToolCallAccumulator::new(slot_mode),
            message: String::new(),
            kind: None,
            held: None,
            chunks: 0,
        }
    }

    /// Relay `body` into `sink` until a finish reason, `[DONE]`, or end of stream
    pub async fn process<S>(mut self, body: ByteStream, sink: &mut S) -> Result<RelayOutcome, RelayError>
    where
        S: EventSink + ?Sized,
    {
        let mut lines = StreamReader::new(body).split(b'\n');

        while let Some(raw) = lines.next_segment().await? {
            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line.strip_suffix('\r').unwrap_or(line),
                Err(e) => {
                    tracing::warn!(error = %e, len = raw.len(), "Skipping stream line with invalid UTF-8");
                    continue;
                }
            };
            let Some(payload) = data_payload(line) else {
                continue;
            };
            if payload == "[DONE]" {
                tracing::debug!(chunks = self.chunks, "Upstream sent [DONE] without finish reason");
                break;
            }

            let chunk: StreamChunk = match serde_json::from_str(payload) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, data = %payload, "Skipping malformed stream chunk");
                    continue;
                }
            };
            if chunk.choices.is_empty() {
                tracing::trace!("Skipping chunk without choices");
                continue;
            }

            if let Some(reason) = self.ingest(chunk, sink).await? {
                return Ok(self.finish(Some(reason)));
            }
        }

        // Stream ended while the first chunk was still held
        if let Some(first) = self.held.take() {
            self.kind = Some(TurnKind::of(&first));
            self.apply(&first, sink).await?;
        }

        Ok(self.finish(None))
    }

    /// Classify if needed, apply the chunk, and report its finish reason
    async fn ingest<S>(&mut self, chunk: StreamChunk, sink: &mut S) -> Result<Option<String>, RelayError>
    where
        S: EventSink + ?Sized,
    {
        self.chunks += 1;
        let reason = finish_reason(&chunk);

        if self.kind.is_none() {
            if self.chunks == 1 && reason.is_none() {
                self.held = Some(chunk);
                return Ok(None);
            }

            let kind = TurnKind::of(&chunk);
            tracing::debug!(kind = ?kind, chunk = self.chunks, "Classified assistant turn");
            self.kind = Some(kind);

            if let Some(first) = self.held.take() {
                self.apply(&first, sink).await?;
            }
        }

        self.apply(&chunk, sink).await?;
        Ok(reason)
    }

    async fn apply<S>(&mut self, chunk: &StreamChunk, sink: &mut S) -> Result<(), RelayError>
    where
        S: EventSink + ?Sized,
    {
        let Some(choice) = chunk.choices.first() else {
            return Ok(());
        };

        match self.kind {
            Some(TurnKind::ToolCall) => {
                for fragment in choice.delta.tool_calls.iter().flatten() {
                    self.accumulator.collect(fragment);
                }
            }
            _ => {
                let content = choice.delta.content.as_deref().unwrap_or_default();
                if content.is_empty() {
                    return Ok(());
                }
                self.message.push_str(content);
                let event = ContentEvent {
                    id: &chunk.id,
                    object: &chunk.object,
                    created: chunk.created,
                    model: &chunk.model,
                    system_fingerprint: chunk.system_fingerprint.as_deref(),
                    choices: [ContentChoice {
                        index: choice.index,
                        delta: ContentDelta { content },
                        finish_reason: choice.finish_reason.as_deref(),
                    }],
                    search_results: self.search_context,
                };
                send_json(sink, &event).await?;
            }
        }

        Ok(())
    }

    fn finish(mut self, reason: Option<String>) -> RelayOutcome {
        let needs_tool_execution = reason.as_deref() == Some(TOOL_CALLS_FINISH_REASON);
        let tool_calls = if needs_tool_execution {
            self.accumulator.finalize()
        } else {
            Vec::new()
        };

        tracing::debug!(
            finish_reason = ?reason,
            chunks = self.chunks,
            content_len = self.message.len(),
            tool_calls = tool_calls.len(),
            "Upstream turn finished"
        );

        RelayOutcome {
            message: self.message,
            tool_calls,
            needs_tool_execution,
            finish_reason: reason,
            chunks: self.chunks,
        }
    }
}

/// Payload of an SSE `data:` line; other lines yield None
fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn finish_reason(chunk: &StreamChunk) -> Option<String> {
    chunk
        .choices
        .first()
        .and_then(|c| c.finish_reason.clone())
        .filter(|r| !r.is_empty())
}
