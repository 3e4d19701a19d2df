//! Outbound chat-completion requests

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

use crate::api::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Raw SSE body of a streaming upstream response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Issues chat-completion requests to the upstream API
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Send a streaming request and return its body once the status is known good
    async fn stream(&self, request: &ChatCompletionRequest, credential: &str) -> Result<ByteStream, ProxyError>;

    /// Send a non-streaming request and decode the response
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
        credential: &str,
    ) -> Result<ChatCompletionResponse, ProxyError>;
}

/// reqwest-backed upstream client
pub struct HttpUpstream {
    client: reqwest::Client,
    completions_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            completions_url: config.completions_url(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    async fn send(&self, request: &ChatCompletionRequest, credential: &str) -> Result<reqwest::Response, ProxyError> {
        tracing::debug!(
            url = %self.completions_url,
            stream = request.stream,
            messages = request.messages.len(),
            "Sending upstream request"
        );

        let mut builder = self
            .client
            .post(&self.completions_url)
            .bearer_auth(credential)
            .json(request);
        // Streams are bounded by the client's read timeout only
        if !request.stream {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error_body = %body, "Upstream returned error response");
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn stream(&self, request: &ChatCompletionRequest, credential: &str) -> Result<ByteStream, ProxyError> {
        let response = self.send(request, credential).await?;
        let body = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(body))
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
        credential: &str,
    ) -> Result<ChatCompletionResponse, ProxyError> {
        let response = self.send(request, credential).await?;
        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProxyError::Upstream(format!("Invalid upstream response: {}", e)))
    }
}
