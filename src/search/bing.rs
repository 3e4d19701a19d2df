use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{capped, endpoint_or, fetch_json, required, SearchBackend, SearchError, SearchResult};
use crate::config::{ApiKeyProviderConfig, SearchBackendKind};

const DEFAULT_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Bing Web Search v7
pub struct BingSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<WebPages>,
}

#[derive(Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Deserialize)]
struct WebPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

impl BingSearch {
    pub fn new(client: reqwest::Client, config: &ApiKeyProviderConfig, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client,
            endpoint: endpoint_or(&config.endpoint, DEFAULT_ENDPOINT),
            api_key: required(&config.api_key, SearchBackendKind::Bing, "bing.api_key")?,
            timeout,
        })
    }
}

#[async_trait]
impl SearchBackend for BingSearch {
    fn kind(&self) -> SearchBackendKind {
        SearchBackendKind::Bing
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let count = max_results.to_string();
        let request = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())]);

        let response: BingResponse = fetch_json(request, self.timeout).await?;
        let results = response
            .web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .map(|page| SearchResult {
                title: page.name,
                link: page.url,
                snippet: page.snippet,
            })
            .collect();
        Ok(capped(results, max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::serve_json;
    use serde_json::json;

    #[tokio::test]
    async fn test_bing_web_pages() {
        let base = serve_json(json!({"_type": "SearchResponse", "webPages": {"value": [
            {"name": "Tokio", "url": "https://tokio.rs", "snippet": "Async runtime"}
        ]}}))
        .await;
        let config = ApiKeyProviderConfig {
            api_key: Some("k".into()),
            endpoint: Some(base),
        };
        let backend = BingSearch::new(reqwest::Client::new(), &config, Duration::from_secs(5)).unwrap();

        let results = backend.search("tokio", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Tokio");
        assert_eq!(results[0].link, "https://tokio.rs");
    }

    #[tokio::test]
    async fn test_bing_without_web_pages() {
        let base = serve_json(json!({"_type": "SearchResponse"})).await;
        let config = ApiKeyProviderConfig {
            api_key: Some("k".into()),
            endpoint: Some(base),
        };
        let backend = BingSearch::new(reqwest::Client::new(), &config, Duration::from_secs(5)).unwrap();
        assert!(backend.search("x", 10).await.unwrap().is_empty());
    }
}
