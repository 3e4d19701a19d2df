use async_trait::async_trait;
use serde_json::{json, Value};

use super::{string_argument, ToolError, ToolModule};
use crate::search::{SearchBackend, SearchResponse};

const NAME: &str = "search";

/// Web search through the configured backend
pub struct SearchTool {
    backend: Box<dyn SearchBackend>,
    max_results: usize,
}

impl SearchTool {
    pub fn new(backend: Box<dyn SearchBackend>, max_results: usize) -> Self {
        Self { backend, max_results }
    }
}

#[async_trait]
impl ToolModule for SearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the internet for real-time information. Use this when you need current \
         information such as dates, weather, news, or facts that may not be in your training \
         data. Results include the title, link and snippet of each relevant page."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query. Be specific and focused on the needed \
                                    information, using keywords likely to appear in relevant results."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<String, ToolError> {
        let query = string_argument(NAME, arguments, "query")?;
        tracing::info!(backend = %self.backend.kind(), query = %query, "Searching");

        let results = self
            .backend
            .search(query, self.max_results)
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;

        serde_json::to_string(&SearchResponse { results }).map_err(|e| ToolError::failed(NAME, e))
    }
}
