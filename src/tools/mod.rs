//! Callable tools offered to the model
//!
//! Every tool is a [`ToolModule`]; the [`ToolRegistry`] dispatches calls by
//! name and is what the orchestrator executes tool-call records against.

mod crawler;
mod registry;
mod search;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::api::Tool;
use crate::config::AppConfig;
use crate::search::{build_backend, SearchError};

pub use crawler::CrawlerTool;
pub use registry::ToolRegistry;
pub use search::SearchTool;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Tool '{0}' is disabled")]
    Disabled(String),

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },
}

impl ToolError {
    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    pub fn failed(tool: &str, reason: impl ToString) -> Self {
        Self::Failed {
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A tool the model can call
#[async_trait]
pub trait ToolModule: Send + Sync {
    /// Function name exposed to the model
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    fn definition(&self) -> Tool {
        Tool::function(self.name(), self.description(), self.parameters())
    }

    /// Run with parsed arguments, returning the text handed back to the model
    async fn execute(&self, arguments: &Value) -> Result<String, ToolError>;
}

/// Executes tool-call records by name
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// `arguments` is the raw JSON string streamed by the model
    async fn execute(&self, name: &str, arguments: &str) -> Result<String, ToolError>;
}

/// Registry holding the built-in `search` and `crawler` tools, configured
/// from `tools.modules`
pub fn create_default_registry(config: &AppConfig, client: reqwest::Client) -> Result<ToolRegistry, SearchError> {
    let backend = build_backend(&config.search, client.clone())?;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(backend, config.search.max_results)));
    registry.register(Arc::new(CrawlerTool::new(
        client,
        &config.crawler.endpoint,
        Duration::from_secs(config.crawler.timeout_seconds),
    )));
    registry.configure(&config.tools.modules);

    Ok(registry)
}

/// Required non-empty string argument
fn string_argument<'a>(tool: &str, arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match arguments.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(ToolError::invalid(tool, format!("'{}' is empty", key))),
        Some(_) => Err(ToolError::invalid(tool, format!("'{}' must be a string", key))),
        None => Err(ToolError::invalid(tool, format!("missing '{}'", key))),
    }
}
