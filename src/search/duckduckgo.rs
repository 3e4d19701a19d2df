use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, SearchBackend, SearchError, SearchResult};
use crate::config::{EndpointConfig, SearchBackendKind};

const DEFAULT_ENDPOINT: &str = "https://ddg.search2ai.online/search";

/// DuckDuckGo through a JSON search relay; no credentials
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct DuckDuckGoResponse {
    #[serde(default)]
    results: Vec<DuckDuckGoHit>,
}

#[derive(Deserialize)]
struct DuckDuckGoHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    href: String,
    #[serde(default)]
    body: String,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client, config: &EndpointConfig, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            timeout,
        }
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Duckduckgo
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let request = self
            .client
            .post(&self.endpoint)
            .json(&json!({"q": query, "max_results": max_results.to_string()}));

        let response: DuckDuckGoResponse = fetch_json(request, self.timeout).await?;
        let results = response
            .results
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                link: hit.href,
                snippet: hit.body,
            })
            .collect();
        Ok(capped(results, max_results))
    }
}
