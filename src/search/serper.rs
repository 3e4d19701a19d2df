use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, required, SearchBackend, SearchError, SearchResult};
use crate::config::{SearchBackendKind, SerperConfig};

const DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

/// serper.dev Google search
pub struct SerperSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    gl: String,
    hl: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SearchResult>,
}

impl SerperSearch {
    pub fn new(client: reqwest::Client, config: &SerperConfig, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            api_key: required(&config.api_key, SearchBackendKind::Serper, "serper.api_key")?,
            gl: config.gl.clone(),
            hl: config.hl.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl SearchBackend for SerperSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Serper
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({"q": query, "gl": self.gl, "hl": self.hl}));

        let response: SerperResponse = fetch_json(request, self.timeout).await?;
        Ok(capped(response.organic, max_results))
    }
}
