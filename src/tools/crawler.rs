use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::{string_argument, ToolError, ToolModule};

const NAME: &str = "crawler";

/// Fetches a page through the crawl service and returns its JSON extract
pub struct CrawlerTool {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl CrawlerTool {
    pub fn new(client: reqwest::Client, endpoint: &str, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
        }
    }
}

fn page_url(arguments: &Value) -> Result<Url, ToolError> {
    let raw = string_argument(NAME, arguments, "url")?;
    let url = Url::parse(raw.trim()).map_err(|e| ToolError::invalid(NAME, format!("bad url: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ToolError::invalid(NAME, format!("unsupported scheme '{}'", other))),
    }
}

#[async_trait]
impl ToolModule for CrawlerTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Extract and analyze the content of a specific web page URL, including its text, title \
         and metadata. Useful for in-depth information after finding a relevant URL via search."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Full URL of the page to analyze. Must be a valid, reachable \
                                    address starting with http:// or https://."
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<String, ToolError> {
        let url = page_url(arguments)?;
        tracing::info!(url = %url, "Crawling");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({"url": url.as_str()}))
            .send()
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ToolError::failed(
                NAME,
                format!("crawl service returned status {}", response.status().as_u16()),
            ));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if !is_json {
            return Err(ToolError::failed(NAME, "crawl service did not return JSON"));
        }

        let body: Value = response.json().await.map_err(|e| ToolError::failed(NAME, e))?;
        serde_json::to_string(&body).map_err(|e| ToolError::failed(NAME, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn tool(endpoint: &str) -> CrawlerTool {
        CrawlerTool::new(reqwest::Client::new(), endpoint, Duration::from_secs(5))
    }

    #[test]
    fn test_page_url_validation() {
        assert!(page_url(&json!({"url": "https://example.com/a"})).is_ok());
        assert!(page_url(&json!({"url": "ftp://example.com"})).is_err());
        assert!(page_url(&json!({"url": "not a url"})).is_err());
        assert!(page_url(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_crawl_posts_url_and_returns_json() {
        let app = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"crawlParameters": body, "results": {"title": "Example", "content": "text"}}))
            }),
        );
        let endpoint = spawn(app).await;

        let text = tool(&endpoint)
            .execute(&json!({"url": "https://example.com/page"}))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["crawlParameters"]["url"], "https://example.com/page");
        assert_eq!(value["results"]["title"], "Example");
    }

    #[tokio::test]
    async fn test_crawl_rejects_non_200() {
        let app = Router::new().route("/", post(|| async { (StatusCode::ACCEPTED, Json(json!({}))) }));
        let endpoint = spawn(app).await;

        let err = tool(&endpoint)
            .execute(&json!({"url": "https://example.com"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("202"));
    }

    #[tokio::test]
    async fn test_crawl_rejects_non_json() {
        let app = Router::new().route("/", post(|| async { "<html></html>" }));
        let endpoint = spawn(app).await;

        let err = tool(&endpoint)
            .execute(&json!({"url": "https://example.com"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not return JSON"));
    }
}
