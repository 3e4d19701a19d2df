//! Client-facing output sink for SSE events

use async_trait::async_trait;
use axum::body::Body;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Client disconnected")]
    Closed,

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writable, explicitly flushable byte sink.
///
/// Writers call `flush` after every complete event; implementations must make
/// everything written so far visible to the client before it returns.
#[async_trait]
pub trait EventSink: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError>;
}

/// Write one `data: <payload>\n\n` event and flush it
pub async fn send_data<S: EventSink + ?Sized>(sink: &mut S, payload: &str) -> Result<(), SinkError> {
    sink.write(b"data: ").await?;
    sink.write(payload.as_bytes()).await?;
    sink.write(b"\n\n").await?;
    sink.flush().await
}

pub async fn send_json<S, T>(sink: &mut S, event: &T) -> Result<(), SinkError>
where
    S: EventSink + ?Sized,
    T: Serialize + Sync,
{
    let payload = serde_json::to_string(event)?;
    send_data(sink, &payload).await
}

/// Stream terminator
pub async fn send_done<S: EventSink + ?Sized>(sink: &mut S) -> Result<(), SinkError> {
    send_data(sink, "[DONE]").await
}

/// Sink backed by a bounded channel feeding an HTTP response body.
///
/// A flush blocks while the channel is full, so a slow client stalls the
/// upstream read instead of growing a buffer.
pub struct ChannelSink {
    buffer: BytesMut,
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                buffer: BytesMut::new(),
                tx,
            },
            rx,
        )
    }

    /// Response body that yields each flushed chunk
    pub fn body(rx: mpsc::Receiver<Bytes>) -> Body {
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        Body::from_stream(stream)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        self.tx.send(chunk).await.map_err(|_| SinkError::Closed)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_send_data_flushes_one_event() {
        let mut sink = MemorySink::default();
        send_data(&mut sink, "{\"a\":1}").await.unwrap();
        send_done(&mut sink).await.unwrap();

        assert_eq!(sink.flushed, vec!["data: {\"a\":1}\n\n", "data: [DONE]\n\n"]);
        assert!(sink.ends_with_done());
    }

    #[tokio::test]
    async fn test_channel_sink_feeds_body() {
        let (mut sink, rx) = ChannelSink::new(4);
        send_json(&mut sink, &serde_json::json!({"x": "y"})).await.unwrap();
        send_done(&mut sink).await.unwrap();
        drop(sink);

        let bytes = to_bytes(ChannelSink::body(rx), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"data: {\"x\":\"y\"}\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);

        let err = send_data(&mut sink, "hello").await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn test_flush_without_writes_is_noop() {
        let (mut sink, mut rx) = ChannelSink::new(1);
        sink.flush().await.unwrap();
        drop(sink);
        assert!(rx.recv().await.is_none());
    }
}
