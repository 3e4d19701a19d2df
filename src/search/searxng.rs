use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{capped, fetch_json, required, SearchBackend, SearchError, SearchResult};
use crate::config::{SearchBackendKind, SearxngConfig};

/// Self-hosted SearXNG instance with the JSON format enabled
pub struct SearxngSearch {
    client: reqwest::Client,
    search_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngHit>,
}

#[derive(Deserialize)]
struct SearxngHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl SearxngSearch {
    pub fn new(client: reqwest::Client, config: &SearxngConfig, timeout: Duration) -> Result<Self, SearchError> {
        let base = required(&config.base_url, SearchBackendKind::Searxng, "searxng.base_url")?;
        Ok(Self {
            client,
            search_url: search_url_for(&base),
            timeout,
        })
    }
}

/// Accept either the instance root or its `/search` endpoint
fn search_url_for(base: &str) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    if !url.ends_with("/search") {
        url.push_str("/search");
    }
    url
}

#[async_trait]
impl SearchBackend for SearxngSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Searxng
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let request = self
            .client
            .get(&self.search_url)
            .query(&[("q", query), ("category", "general"), ("format", "json")]);

        let response: SearxngResponse = fetch_json(request, self.timeout).await?;
        let results = response
            .results
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                link: hit.url,
                snippet: hit.content,
            })
            .collect();
        Ok(capped(results, max_results))
    }
}
