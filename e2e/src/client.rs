//! The proxy as a chat client sees it

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::types::{ProxyResponse, SseEvent, StreamingResponse};

/// Bearer token every test client presents unless a test says otherwise
pub const CLIENT_API_KEY: &str = "sk-e2e";

/// Longest a single exchange may take, tool rounds included
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to one proxy instance over plain HTTP
#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    base: String,
}

impl ProxyClient {
    pub fn new(addr: &str) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(EXCHANGE_TIMEOUT).build()?;
        Ok(Self {
            http,
            base: format!("http://{}", addr),
        })
    }

    pub fn addr(&self) -> &str {
        self.base.trim_start_matches("http://")
    }

    /// True once `/health` answers 200
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base);
        matches!(self.http.get(url).send().await, Ok(r) if r.status() == StatusCode::OK)
    }

    /// Chat request with the default test credential, body sent as given
    pub async fn chat(&self, body: Value) -> anyhow::Result<ProxyResponse> {
        self.chat_as(body, Some(CLIENT_API_KEY)).await
    }

    /// Chat request with an explicit credential; `None` sends no Authorization
    /// header. Any status is returned; the body must be JSON.
    pub async fn chat_as(&self, body: Value, api_key: Option<&str>) -> anyhow::Result<ProxyResponse> {
        let resp = self.post_chat(&body, api_key).await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(300).collect();
            anyhow::anyhow!("{} returned non-JSON body ({}): {}", status, e, preview)
        })?;
        Ok(ProxyResponse { status, body })
    }

    /// Streaming chat request; reads the whole SSE body before returning
    pub async fn chat_stream(&self, mut body: Value) -> anyhow::Result<StreamingResponse> {
        body["stream"] = Value::Bool(true);
        let resp = self.post_chat(&body, Some(CLIENT_API_KEY)).await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Streaming request failed with {}: {}", status, text);
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        anyhow::ensure!(
            content_type.starts_with("text/event-stream"),
            "Streaming response has content type {:?}",
            content_type
        );

        let mut raw = Vec::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            raw.extend_from_slice(&chunk?);
        }

        Ok(StreamingResponse {
            events: parse_sse(&String::from_utf8_lossy(&raw)),
        })
    }

    /// GET a local route; non-JSON bodies come back as a JSON string
    pub async fn get(&self, path: &str) -> anyhow::Result<ProxyResponse> {
        let resp = self.http.get(format!("{}{}", self.base, path)).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ProxyResponse { status, body })
    }

    async fn post_chat(&self, body: &Value, api_key: Option<&str>) -> anyhow::Result<reqwest::Response> {
        let mut request = self.http.post(format!("{}/v1/chat/completions", self.base)).json(body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Proxy at {} unreachable: {}", self.base, e))
    }
}

/// Split an SSE body into events.
///
/// `data:` lines accumulate until a blank line ends the event; multiple data
/// lines join with `\n`. Comments and other fields are ignored.
fn parse_sse(text: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut data: Option<String> = None;

    let mut flush = |data: &mut Option<String>| {
        if let Some(payload) = data.take() {
            events.push(SseEvent {
                is_done: payload == "[DONE]",
                data: payload,
            });
        }
    };

    for line in text.lines() {
        if line.is_empty() {
            flush(&mut data);
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    flush(&mut data);

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_and_done() {
        let events = parse_sse("data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, [r#"{"a":1}"#, r#"{"b":2}"#, "[DONE]"]);
        assert!(events[2].is_done);
        assert!(!events[0].is_done);
    }

    #[test]
    fn test_comments_and_other_fields_skipped() {
        let events = parse_sse(": keep-alive\n\nevent: message\ndata: {\"x\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, r#"{"x":1}"#);
    }

    #[test]
    fn test_multi_line_data_and_missing_trailing_blank() {
        let events = parse_sse("data: first\ndata:second\n\ndata: [DONE]");
        assert_eq!(events[0].data, "first\nsecond");
        assert!(events[1].is_done);
    }

    #[test]
    fn test_addr_round_trip() {
        let client = ProxyClient::new("127.0.0.1:18066").unwrap();
        assert_eq!(client.addr(), "127.0.0.1:18066");
    }
}
