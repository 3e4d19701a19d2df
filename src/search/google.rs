use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, required, SearchBackend, SearchError, SearchResult};
use crate::config::{GoogleConfig, SearchBackendKind};

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search (Custom Search JSON API)
pub struct GoogleSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    cx: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}

impl GoogleSearch {
    pub fn new(client: reqwest::Client, config: &GoogleConfig, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            api_key: required(&config.api_key, SearchBackendKind::Google, "google.api_key")?,
            cx: required(&config.cx, SearchBackendKind::Google, "google.cx")?,
            timeout,
        })
    }
}

#[async_trait]
impl SearchBackend for GoogleSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Google
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        // The API serves at most 10 items per page
        let num = max_results.clamp(1, 10).to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("cx", self.cx.as_str()),
            ("key", self.api_key.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ]);

        let response: GoogleResponse = fetch_json(request, self.timeout).await?;
        Ok(capped(response.items, max_results))
    }
}
