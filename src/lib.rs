//! search-proxy: OpenAI-compatible chat proxy with web search tools
//!
//! Features:
//! - Injects `search` and `crawler` tool definitions into chat requests
//! - Runs the model's tool calls and continues the conversation upstream
//! - Relays the final answer as SSE with the tool results attached
//! - Pluggable search backends (DuckDuckGo, SearXNG, Google, Bing, ...)

pub mod api;
pub mod config;
pub mod error;
pub mod proxy;
pub mod search;
pub mod stats;
pub mod tools;

pub use config::AppConfig;
pub use error::ProxyError;
pub use proxy::run_server;
pub use tools::{create_default_registry, ToolRegistry};
