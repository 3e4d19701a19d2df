use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, required, SearchBackend, SearchError, SearchResult};
use crate::config::{ApiKeyProviderConfig, SearchBackendKind};

const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search";

/// SerpApi, Google engine
pub struct SerpApiSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SearchResult>,
}

impl SerpApiSearch {
    pub fn new(client: reqwest::Client, config: &ApiKeyProviderConfig, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            api_key: required(&config.api_key, SearchBackendKind::Serpapi, "serpapi.api_key")?,
            timeout,
        })
    }
}

#[async_trait]
impl SearchBackend for SerpApiSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Serpapi
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("api_key", self.api_key.as_str()),
            ("engine", "google"),
            ("q", query),
            ("google_domain", "google.com"),
        ]);

        let response: SerpApiResponse = fetch_json(request, self.timeout).await?;
        Ok(capped(response.organic_results, max_results))
    }
}
