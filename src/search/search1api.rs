use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, SearchBackend, SearchError, SearchResponse, SearchResult};
use crate::config::{ApiKeyProviderConfig, SearchBackendKind};

const DEFAULT_ENDPOINT: &str = "https://api.search1api.com/search/";

/// search1api.com; the key is optional for the public tier
pub struct Search1ApiSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Search1ApiSearch {
    pub fn new(client: reqwest::Client, config: &ApiKeyProviderConfig, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
        }
    }
}

#[async_trait]
impl SearchBackend for Search1ApiSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Search1api
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "query": query,
            "max_results": max_results.to_string(),
            "crawl_results": "0",
        }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response: SearchResponse = fetch_json(request, self.timeout).await?;
        Ok(capped(response.results, max_results))
    }
}
