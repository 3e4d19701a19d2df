//! Chat-completion request handler

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::accumulator::SlotMode;
use super::orchestrator::{ExchangeOutcome, Orchestrator};
use super::server::ProxyState;
use super::sink::ChannelSink;
use crate::api::ChatCompletionRequest;
use crate::error::ProxyError;
use crate::stats::{format_request_log, format_summary, ExchangeSummary, ExchangeTimer};
use crate::tools::ToolExecutor;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Buffered SSE events between the exchange task and the response body
const SINK_CAPACITY: usize = 32;

pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    pub async fn handle(&self, req: Request<Body>) -> Result<Response, ProxyError> {
        let headers = req.headers().clone();
        let body = to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ProxyError::BadRequest(format!("Failed to read request body: {}", e)))?;

        let mut request: ChatCompletionRequest = serde_json::from_slice(&body)
            .map_err(|e| ProxyError::BadRequest(format!("Invalid chat completion request: {}", e)))?;

        let credential = self.credential(&headers).ok_or(ProxyError::MissingCredential)?;

        if request.tools.is_none() {
            let definitions = self.state.tools.definitions();
            if !definitions.is_empty() {
                tracing::debug!(count = definitions.len(), "Injecting tool definitions");
                request.tools = Some(definitions);
            }
        }

        tracing::info!("{}", format_request_log(&request));

        let timer = ExchangeTimer::start(&request.model, request.stream);
        tracing::debug!(request_id = %timer.request_id(), "Exchange started");
        let streaming = request.stream;
        let config = &self.state.config;
        let tools: Arc<dyn ToolExecutor> = self.state.tools.clone();
        let mut orchestrator = Orchestrator::new(request, credential, self.state.upstream.clone(), tools)
            .with_max_iterations(config.orchestrator.max_iterations)
            .with_slot_mode(SlotMode::from_parallel(config.tools.parallel_tool_calls));

        if streaming {
            self.stream(orchestrator, timer).await
        } else {
            let result = orchestrator.complete().await;
            let outcome = match &result {
                Ok(_) => ExchangeOutcome::Completed,
                Err(ProxyError::ContinuationLimitExceeded(_)) => ExchangeOutcome::ContinuationLimitExceeded,
                Err(_) => ExchangeOutcome::UpstreamFailed,
            };
            self.log_summary(timer.finish(orchestrator.stats(), outcome));
            Ok(Json(result?).into_response())
        }
    }

    /// Open the first upstream stream, then hand the exchange to a task that
    /// feeds the SSE response body
    async fn stream(&self, mut orchestrator: Orchestrator, timer: ExchangeTimer) -> Result<Response, ProxyError> {
        let first_body = match orchestrator.open_stream().await {
            Ok(body) => body,
            Err(e) => {
                self.log_summary(timer.finish(orchestrator.stats(), ExchangeOutcome::UpstreamFailed));
                return Err(e);
            }
        };

        let (mut sink, rx) = ChannelSink::new(SINK_CAPACITY);
        let handler = ProxyHandler::new(self.state.clone());
        tokio::spawn(async move {
            let outcome = orchestrator.run_stream(first_body, &mut sink).await;
            handler.log_summary(timer.finish(orchestrator.stats(), outcome));
        });

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(ChannelSink::body(rx))
            .map_err(|e| ProxyError::Internal(e.to_string()))
    }

    /// Bearer token from the request, else the configured fallback key
    fn credential(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers).or_else(|| {
            self.state
                .config
                .upstream
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
        })
    }

    fn log_summary(&self, summary: ExchangeSummary) {
        let stats = &self.state.config.stats;
        if stats.enabled {
            tracing::info!("{}", format_summary(&summary, stats.format));
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then(|| token.to_string())
}
