//! Web search backends
//!
//! Every provider maps its own response format to [`SearchResult`]. The
//! backend is picked once at startup from `search.backend`.

mod bing;
mod duckduckgo;
mod google;
mod search1api;
mod searxng;
mod serpapi;
mod serper;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{SearchBackendKind, SearchConfig};

pub use bing::BingSearch;
pub use duckduckgo::DuckDuckGoSearch;
pub use google::GoogleSearch;
pub use search1api::Search1ApiSearch;
pub use searxng::SearxngSearch;
pub use serpapi::SerpApiSearch;
pub use serper::SerperSearch;

/// One normalized search hit
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// Payload handed to the model as the search tool result
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search backend '{backend}' is not configured: {reason}")]
    NotConfigured { backend: SearchBackendKind, reason: String },

    #[error("Search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Search backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected search response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn kind(&self) -> SearchBackendKind;

    /// Run a query, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}

/// Build the configured backend, checking its credentials
pub fn build_backend(config: &SearchConfig, client: reqwest::Client) -> Result<Box<dyn SearchBackend>, SearchError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let backend: Box<dyn SearchBackend> = match config.backend {
        SearchBackendKind::Search1api => Box::new(Search1ApiSearch::new(client, &config.search1api, timeout)),
        SearchBackendKind::Google => Box::new(GoogleSearch::new(client, &config.google, timeout)?),
        SearchBackendKind::Bing => Box::new(BingSearch::new(client, &config.bing, timeout)?),
        SearchBackendKind::Serpapi => Box::new(SerpApiSearch::new(client, &config.serpapi, timeout)?),
        SearchBackendKind::Serper => Box::new(SerperSearch::new(client, &config.serper, timeout)?),
        SearchBackendKind::Duckduckgo => Box::new(DuckDuckGoSearch::new(client, &config.duckduckgo, timeout)),
        SearchBackendKind::Searxng => Box::new(SearxngSearch::new(client, &config.searxng, timeout)?),
    };
    tracing::debug!(backend = %config.backend, "Search backend ready");
    Ok(backend)
}

/// Non-empty configured value, or a NotConfigured error naming `field`
fn required(value: &Option<String>, backend: SearchBackendKind, field: &str) -> Result<String, SearchError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| SearchError::NotConfigured {
            backend,
            reason: format!("missing {}", field),
        })
}

fn endpoint_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Send with a timeout, reject non-2xx, decode JSON
async fn fetch_json<T: DeserializeOwned>(request: reqwest::RequestBuilder, timeout: Duration) -> Result<T, SearchError> {
    let response = request.timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SearchError::Decode(e.to_string()))
}

fn capped(mut results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    results.truncate(max_results);
    results
}
