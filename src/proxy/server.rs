//! Proxy server wiring

use anyhow::Context;
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::ProxyHandler;
use super::upstream::{HttpUpstream, UpstreamClient};
use crate::config::AppConfig;
use crate::tools::{create_default_registry, ToolRegistry};

/// Shared state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub tools: Arc<ToolRegistry>,
}

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client shared by the upstream, search backends and crawler
pub fn build_http_client(config: &AppConfig) -> anyhow::Result<reqwest::Client> {
    // Idle read timeout only; SSE bodies may run longer than timeout_seconds
    let mut client_builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .read_timeout(Duration::from_secs(config.upstream.timeout_seconds))
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.upstream.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let pem = std::fs::read(ca_path).with_context(|| format!("reading CA certificate {}", ca_path))?;
            let ca_cert = reqwest::Certificate::from_pem(&pem)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }
    }

    Ok(client_builder.build()?)
}

/// Build the shared state from configuration
pub fn build_state(config: AppConfig) -> anyhow::Result<ProxyState> {
    let http_client = build_http_client(&config)?;
    let tools = create_default_registry(&config, http_client.clone()).context("configuring tools")?;
    let upstream = HttpUpstream::new(http_client, &config.upstream);

    Ok(ProxyState {
        config: Arc::new(config),
        upstream: Arc::new(upstream),
        tools: Arc::new(tools),
    })
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .route("/v1/chat/completions", post(chat_completions_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the proxy server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let upstream_url = config.upstream.base_url().to_string();
    let backend = config.search.backend;

    let app = router(build_state(config)?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("search-proxy listening on {}", addr);
    tracing::info!("Proxying to {} (search backend: {})", upstream_url, backend);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn welcome_handler() -> &'static str {
    "search-proxy is running. POST OpenAI-style chat completions to /v1/chat/completions"
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn chat_completions_handler(State(state): State<ProxyState>, req: Request) -> Response {
    let handler = ProxyHandler::new(state);
    match handler.handle(req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchBackendKind;
    use crate::proxy::streaming::testing::*;
    use crate::proxy::upstream::testing::MockUpstream;
    use crate::search::testing::StaticSearch;
    use crate::tools::SearchTool;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_with(upstream: Arc<MockUpstream>, config: AppConfig) -> ProxyState {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(SearchTool::new(Box::new(StaticSearch::with_results(2)), 10)));
        ProxyState {
            config: Arc::new(config),
            upstream,
            tools: Arc::new(tools),
        }
    }

    fn chat(body: Value, auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::post("/v1/chat/completions").header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_welcome() {
        let app = router(state_with(Arc::new(MockUpstream::default()), AppConfig::default()));

        let response = app
            .clone()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");

        let response = app
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_string(response).await.contains("search-proxy"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let upstream = Arc::new(MockUpstream::default());
        let app = router(state_with(upstream.clone(), AppConfig::default()));

        let request = HttpRequest::post("/v1/chat/completions")
            .header(header::AUTHORIZATION, "Bearer k")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(upstream.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let upstream = Arc::new(MockUpstream::default());
        let app = router(state_with(upstream.clone(), AppConfig::default()));

        let body = json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]});
        let response = app.oneshot(chat(body, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(upstream.request_count(), 0);
    }

    #[tokio::test]
    async fn test_configured_key_is_fallback_credential() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.push_stream(text_turn(&["ok"]));
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-config".into());
        let app = router(state_with(upstream.clone(), config));

        let body = json!({"model": "gpt-4o", "stream": true, "messages": [{"role": "user", "content": "hi"}]});
        let response = app.oneshot(chat(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_string(response).await;

        assert_eq!(upstream.credentials.lock().unwrap()[0], "sk-config");
    }

    #[tokio::test]
    async fn test_streaming_exchange() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.push_stream(tool_turn("c1", "search", &["{\"query\":\"cats\"}"]));
        upstream.push_stream(text_turn(&["Found ", "cats"]));
        let app = router(state_with(upstream.clone(), AppConfig::default()));

        let body = json!({"model": "gpt-4o", "stream": true, "messages": [{"role": "user", "content": "cats?"}]});
        let response = app.oneshot(chat(body, Some("Bearer sk-client"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let text = body_string(response).await;
        let events: Vec<&str> = text
            .split("\n\n")
            .filter_map(|e| e.strip_prefix("data: "))
            .collect();
        assert_eq!(events.len(), 3);
        let first: Value = serde_json::from_str(events[0]).unwrap();
        assert_eq!(first["choices"][0]["delta"]["content"], "Found ");
        assert_eq!(first["search_results"][0]["name"], "search");
        assert_eq!(events[2], "[DONE]");

        let requests = upstream.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let injected = requests[0].tools.as_ref().unwrap();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].function.name, "search");
        assert_eq!(upstream.credentials.lock().unwrap()[1], "sk-client");
    }

    #[tokio::test]
    async fn test_client_tools_are_not_replaced() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.push_stream(text_turn(&["x"]));
        let app = router(state_with(upstream.clone(), AppConfig::default()));

        let body = json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"type": "function", "function": {"name": "weather", "parameters": {}}}]
        });
        let response = app.oneshot(chat(body, Some("Bearer k"))).await.unwrap();
        body_string(response).await;

        let requests = upstream.requests.lock().unwrap();
        let tools = requests[0].tools.as_ref().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "weather");
    }

    #[tokio::test]
    async fn test_first_upstream_failure_is_plain_error() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.push_stream_error(crate::error::ProxyError::UpstreamStatus {
            status: 401,
            body: "bad key".into(),
        });
        let app = router(state_with(upstream, AppConfig::default()));

        let body = json!({"model": "gpt-4o", "stream": true, "messages": [{"role": "user", "content": "hi"}]});
        let response = app.oneshot(chat(body, Some("Bearer k"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["type"], "upstream_status_error");
    }

    #[tokio::test]
    async fn test_non_streaming_exchange() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.push_completion(
            serde_json::from_value(json!({
                "id": "r1", "object": "chat.completion", "created": 1, "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            }))
            .unwrap(),
        );
        let app = router(state_with(upstream, AppConfig::default()));

        let body = json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]});
        let response = app.oneshot(chat(body, Some("Bearer k"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["choices"][0]["message"]["content"], "Hi there");
        assert_eq!(body["usage"]["total_tokens"], 5);
    }

    #[test]
    fn test_build_state_rejects_unconfigured_backend() {
        let mut config = AppConfig::default();
        config.search.backend = SearchBackendKind::Serper;
        assert!(build_state(config).is_err());
    }

    #[test]
    fn test_build_state_default() {
        let state = build_state(AppConfig::default()).unwrap();
        assert_eq!(state.tools.definitions().len(), 2);
    }
}
