//! Mock services the proxy talks to
//!
//! One server plays three roles: the upstream chat-completion API, a SearXNG
//! instance, and the crawl service. Tests queue upstream responses on
//! [`Mocks`] before each request and inspect what each role received after.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, ReceivedRequest, SharedBackendState};

/// Default models list returned by /v1/models
fn default_models_response() -> &'static str {
    r#"{"object":"list","data":[{"id":"test-model","object":"model","created":1700000000,"owned_by":"e2e"}]}"#
}

/// Served when no response is queued
fn default_completion_response(streaming: bool) -> MockResponse {
    if streaming {
        MockResponse::sse(&[
            r#"{"id":"chatcmpl-default","object":"chat.completion.chunk","created":1700000000,"model":"test-model","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#.to_string(),
            r#"{"id":"chatcmpl-default","object":"chat.completion.chunk","created":1700000000,"model":"test-model","choices":[{"index":0,"delta":{"content":"Default response (no mock queued)"},"finish_reason":null}]}"#.to_string(),
            r#"{"id":"chatcmpl-default","object":"chat.completion.chunk","created":1700000000,"model":"test-model","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#.to_string(),
            "[DONE]".to_string(),
        ])
    } else {
        MockResponse::json(
            r#"{"id":"chatcmpl-default","object":"chat.completion","created":1700000000,"model":"test-model","choices":[{"index":0,"message":{"role":"assistant","content":"Default response (no mock queued)"},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
    }
}

/// Handle POST /v1/chat/completions - serves pre-configured mock responses
async fn handle_chat_completions(State(state): State<SharedBackendState>, request: Request<Body>) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body_bytes = axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    let streaming = body["stream"].as_bool().unwrap_or(false);

    let mock_response = {
        let mut state = state.lock().unwrap();
        state.received_requests.push(ReceivedRequest { authorization, body });
        state
            .response_queue
            .pop_front()
            .unwrap_or_else(|| default_completion_response(streaming))
    };

    Response::builder()
        .status(mock_response.status)
        .header(header::CONTENT_TYPE, &mock_response.content_type)
        .body(Body::from(mock_response.body))
        .unwrap()
        .into_response()
}

/// GET /search?q=..&format=json - a SearXNG instance with three canned hits
async fn handle_search(
    State(state): State<SharedBackendState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("format").map(String::as_str) != Some("json") {
        return (StatusCode::FORBIDDEN, "format must be json").into_response();
    }
    let query = params.get("q").cloned().unwrap_or_default();
    state.lock().unwrap().search_queries.push(query.clone());

    let results: Vec<Value> = (1..=5)
        .map(|i| {
            json!({
                "title": format!("{} result {}", query, i),
                "url": format!("https://example.com/{}", i),
                "content": format!("Snippet {} about {}", i, query),
                "engine": "mock"
            })
        })
        .collect();
    Json(json!({"query": query, "number_of_results": results.len(), "results": results})).into_response()
}

/// POST /crawl {"url": ..} - the crawl service
async fn handle_crawl(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Response {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().crawled_urls.push(url.clone());

    if url.contains("broken") {
        return (StatusCode::BAD_GATEWAY, "crawl failed").into_response();
    }
    Json(json!({
        "crawlParameters": {"url": url},
        "results": {"title": "Crawled page", "link": url, "content": "Full page text"}
    }))
    .into_response()
}

async fn handle_models(headers: HeaderMap) -> impl IntoResponse {
    let status = if headers.contains_key(header::AUTHORIZATION) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, [(header::CONTENT_TYPE, "application/json")], default_models_response())
}

/// Handle to the running mock services, shared by every test
#[derive(Clone)]
pub struct Mocks {
    state: SharedBackendState,
}

impl Mocks {
    /// Bind the mock services on 127.0.0.1:`port`
    pub async fn start(port: u16) -> anyhow::Result<Self> {
        let state: SharedBackendState = Arc::new(Mutex::new(BackendState::default()));

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat_completions))
            .route("/v1/models", get(handle_models))
            .route("/search", get(handle_search))
            .route("/crawl", post(handle_crawl))
            .with_state(state.clone());

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Cannot bind mock services to {}: {}", addr, e))?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock services stopped: {}", e);
            }
        });

        Ok(Self { state })
    }

    /// Next upstream response for /v1/chat/completions
    pub fn queue(&self, response: MockResponse) {
        self.lock().response_queue.push_back(response);
    }

    /// Chat requests the upstream received since the last call
    pub fn take_requests(&self) -> Vec<ReceivedRequest> {
        std::mem::take(&mut self.lock().received_requests)
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.lock().search_queries.clone()
    }

    pub fn crawled_urls(&self) -> Vec<String> {
        self.lock().crawled_urls.clone()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
