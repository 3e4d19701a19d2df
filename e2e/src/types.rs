//! Shared types for the e2e test framework

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock response the upstream will serve for the next request to /v1/chat/completions
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

impl MockResponse {
    /// A JSON chat completion response
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    /// An SSE body made of `data:` payload lines
    pub fn sse(payloads: &[String]) -> Self {
        let body: String = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
        Self {
            status: 200,
            body,
            content_type: "text/event-stream".to_string(),
        }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }
}

/// Shared state for the mock upstream, search and crawl services
#[derive(Debug, Default)]
pub struct BackendState {
    /// Tests push responses, the upstream pops and serves them
    pub response_queue: VecDeque<MockResponse>,
    /// Chat requests received by the upstream (for inspection)
    pub received_requests: Vec<ReceivedRequest>,
    /// `q` parameter of every SearXNG query
    pub search_queries: Vec<String>,
    /// `url` of every crawl request
    pub crawled_urls: Vec<String>,
}

impl BackendState {
    pub fn reset(&mut self) {
        self.response_queue.clear();
        self.received_requests.clear();
        self.search_queries.clear();
        self.crawled_urls.clear();
    }
}

/// A chat request received by the mock upstream
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

impl ReceivedRequest {
    /// Roles of the conversation sent upstream, in order
    pub fn roles(&self) -> Vec<String> {
        self.body["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m["role"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the tool definitions sent upstream
    pub fn tool_names(&self) -> Vec<String> {
        self.body["tools"]
            .as_array()
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|t| t["function"]["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// A parsed SSE event from the proxy streaming response
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub data: String,
    pub is_done: bool,
}

impl SseEvent {
    pub fn parse_json(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::from_str(&self.data).map_err(|e| anyhow::anyhow!("SSE JSON parse error: {}: {}", e, self.data))
    }
}

/// Result of a non-streaming proxy request
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ProxyResponse {
    /// Get a nested field using dot notation (e.g. "choices.0.message.content")
    pub fn get(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = &self.body;
        for part in path.split('.') {
            current = if let Ok(idx) = part.parse::<usize>() {
                current.as_array()?.get(idx)?
            } else {
                current.as_object()?.get(part)?
            };
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }
}

/// Result of a streaming proxy request - all parsed SSE events
#[derive(Debug)]
pub struct StreamingResponse {
    pub events: Vec<SseEvent>,
}

impl StreamingResponse {
    /// Check that the stream ends with [DONE]
    pub fn has_done_marker(&self) -> bool {
        self.events.last().map(|e| e.is_done).unwrap_or(false)
    }

    /// Get all data events (excluding [DONE])
    pub fn data_events(&self) -> Vec<&SseEvent> {
        self.events.iter().filter(|e| !e.is_done).collect()
    }

    /// Accumulate all text content deltas
    pub fn accumulated_content(&self) -> String {
        let mut result = String::new();
        for event in self.data_events() {
            if let Ok(json) = event.parse_json() {
                if let Some(content) = json.pointer("/choices/0/delta/content").and_then(|v| v.as_str()) {
                    result.push_str(content);
                }
            }
        }
        result
    }

    /// `search_results` attached to the first content event, if any
    pub fn search_results(&self) -> Option<serde_json::Value> {
        self.data_events()
            .first()
            .and_then(|e| e.parse_json().ok())
            .and_then(|json| json.get("search_results").cloned())
    }

    /// `error` object of an in-band error event, if any
    pub fn error_event(&self) -> Option<serde_json::Value> {
        self.data_events()
            .iter()
            .filter_map(|e| e.parse_json().ok())
            .find_map(|json| json.get("error").cloned())
    }
}
