//! Tool-call continuation loop
//!
//! One [`Orchestrator`] owns the conversation of one client exchange. Each
//! time the model ends a turn asking for tools, the calls are executed, their
//! results appended, and the upstream request is issued again with the grown
//! conversation. The number of tool rounds is bounded by `max_iterations`.

use futures::future::join_all;
use std::sync::Arc;

use super::accumulator::SlotMode;
use super::sink::{send_done, send_json, EventSink};
use super::streaming::{RelayError, StreamRelay};
use super::upstream::{ByteStream, UpstreamClient};
use crate::api::{ChatCompletionRequest, ChatCompletionResponse, Message, ToolCallRecord};
use crate::error::ProxyError;
use crate::tools::ToolExecutor;

/// How a streaming exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The model finished a turn without requesting tools
    Completed,
    /// A tool batch produced no usable result
    NoToolResults,
    ContinuationLimitExceeded,
    UpstreamFailed,
    ClientDisconnected,
}

impl ExchangeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeOutcome::Completed => "completed",
            ExchangeOutcome::NoToolResults => "no_tool_results",
            ExchangeOutcome::ContinuationLimitExceeded => "continuation_limit_exceeded",
            ExchangeOutcome::UpstreamFailed => "upstream_failed",
            ExchangeOutcome::ClientDisconnected => "client_disconnected",
        }
    }
}

impl std::fmt::Display for ExchangeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// Upstream requests issued
    pub rounds: usize,
    pub tools_executed: usize,
    pub tools_failed: usize,
}

pub struct Orchestrator {
    request: ChatCompletionRequest,
    credential: String,
    /// Tool messages of the most recent successful batch
    search_context: Vec<Message>,
    max_iterations: usize,
    slot_mode: SlotMode,
    upstream: Arc<dyn UpstreamClient>,
    tools: Arc<dyn ToolExecutor>,
    stats: ExchangeStats,
}

impl Orchestrator {
    pub fn new(
        request: ChatCompletionRequest,
        credential: String,
        upstream: Arc<dyn UpstreamClient>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            request,
            credential,
            search_context: Vec::new(),
            max_iterations: 8,
            slot_mode: SlotMode::default(),
            upstream,
            tools,
            stats: ExchangeStats::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_slot_mode(mut self, slot_mode: SlotMode) -> Self {
        self.slot_mode = slot_mode;
        self
    }

    pub fn stats(&self) -> ExchangeStats {
        self.stats
    }

    pub fn conversation(&self) -> &[Message] {
        &self.request.messages
    }

    /// Issue the streaming upstream request for the current conversation
    pub async fn open_stream(&mut self) -> Result<ByteStream, ProxyError> {
        self.stats.rounds += 1;
        self.upstream.stream(&self.request, &self.credential).await
    }

    /// Relay `first_body` and every continuation into `sink`.
    ///
    /// Always ends the client stream with `[DONE]` unless the client is gone.
    /// Failures after the first byte are reported as an error event first.
    pub async fn run_stream<S>(&mut self, first_body: ByteStream, sink: &mut S) -> ExchangeOutcome
    where
        S: EventSink + ?Sized,
    {
        let mut body = first_body;
        let mut tool_rounds = 0;

        loop {
            let relay = StreamRelay::new(self.slot_mode, &self.search_context);
            let turn = match relay.process(body, sink).await {
                Ok(turn) => turn,
                Err(RelayError::Sink(e)) => {
                    tracing::info!(error = %e, "Client went away, abandoning exchange");
                    return ExchangeOutcome::ClientDisconnected;
                }
                Err(RelayError::Upstream(e)) => {
                    let err = ProxyError::Upstream(e.to_string());
                    return self.abort(sink, ExchangeOutcome::UpstreamFailed, err).await;
                }
            };

            if !turn.needs_tool_execution {
                return self.finish(sink, ExchangeOutcome::Completed).await;
            }

            if tool_rounds >= self.max_iterations {
                let err = ProxyError::ContinuationLimitExceeded(tool_rounds);
                return self.abort(sink, ExchangeOutcome::ContinuationLimitExceeded, err).await;
            }
            tool_rounds += 1;

            let results = self.execute_tools(Some(turn.message), turn.tool_calls).await;
            if results.is_empty() {
                return self.finish(sink, ExchangeOutcome::NoToolResults).await;
            }
            self.search_context = results;

            body = match self.open_stream().await {
                Ok(next) => next,
                Err(e) => return self.abort(sink, ExchangeOutcome::UpstreamFailed, e).await,
            };
        }
    }

    /// Non-streaming exchange: request, run tools, repeat until a plain answer
    pub async fn complete(&mut self) -> Result<ChatCompletionResponse, ProxyError> {
        let mut tool_rounds = 0;

        loop {
            self.stats.rounds += 1;
            let response = self.upstream.complete(&self.request, &self.credential).await?;
            let calls = response.tool_calls().to_vec();
            if calls.is_empty() {
                return Ok(response);
            }

            if tool_rounds >= self.max_iterations {
                return Err(ProxyError::ContinuationLimitExceeded(tool_rounds));
            }
            tool_rounds += 1;

            let content = response.choices.first().and_then(|c| c.message.content.clone());
            let results = self.execute_tools(content, calls).await;
            if results.is_empty() {
                tracing::debug!("No tool results, returning tool-call response as is");
                return Ok(response);
            }
            self.search_context = results;
        }
    }

    /// Run one batch concurrently and append the assistant turn plus one tool
    /// message per successful call. Returns the appended tool messages.
    async fn execute_tools(&mut self, content: Option<String>, calls: Vec<ToolCallRecord>) -> Vec<Message> {
        if calls.is_empty() {
            tracing::warn!("Model finished with tool_calls but sent no tool call");
            return Vec::new();
        }

        let tools = &self.tools;
        let outputs = join_all(
            calls
                .iter()
                .map(|call| tools.execute(&call.function.name, &call.function.arguments)),
        )
        .await;

        let mut results = Vec::with_capacity(calls.len());
        for (call, output) in calls.iter().zip(outputs) {
            match output {
                Ok(text) => {
                    self.stats.tools_executed += 1;
                    results.push(Message::tool_result(call, text));
                }
                Err(e) => {
                    self.stats.tools_failed += 1;
                    tracing::warn!(tool = %call.function.name, call_id = %call.id, error = %e, "Skipping failed tool call");
                }
            }
        }

        tracing::info!(
            requested = calls.len(),
            succeeded = results.len(),
            "Tool batch finished"
        );

        self.request.messages.push(Message::assistant_tool_calls(content, calls));
        self.request.messages.extend(results.iter().cloned());
        results
    }

    async fn finish<S>(&self, sink: &mut S, outcome: ExchangeOutcome) -> ExchangeOutcome
    where
        S: EventSink + ?Sized,
    {
        match send_done(sink).await {
            Ok(()) => outcome,
            Err(_) => ExchangeOutcome::ClientDisconnected,
        }
    }

    async fn abort<S>(&self, sink: &mut S, outcome: ExchangeOutcome, err: ProxyError) -> ExchangeOutcome
    where
        S: EventSink + ?Sized,
    {
        tracing::error!(error = %err, outcome = %outcome, "Exchange aborted");
        if send_json(sink, &err.to_body()).await.is_err() {
            return ExchangeOutcome::ClientDisconnected;
        }
        self.finish(sink, outcome).await
    }
}
