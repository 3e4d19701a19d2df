mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use loader::{load_config, resolve_variables};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3014
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Upstream chat-completion API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL; `/v1/chat/completions` is appended
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Longest silence on an upstream connection, and the total deadline
    /// of a non-streaming request, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Credential used when the client sends no Authorization header
    #[serde(default)]
    pub api_key: Option<String>,
}

/// TLS configuration for upstream connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
}

fn default_upstream_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_timeout() -> u64 {
    300
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout_seconds: default_timeout(),
            tls: None,
            api_key: None,
        }
    }
}

impl UpstreamConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url())
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }
}

/// Tool-call continuation loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Maximum number of tool rounds per client request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize {
    8
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Per-tool switches keyed by tool name
    #[serde(default)]
    pub modules: HashMap<String, ToolModuleConfig>,
    /// Accumulate one tool call per stream index instead of a single slot
    #[serde(default)]
    pub parallel_tool_calls: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolModuleConfig {
    pub enabled: bool,
}

/// Search backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    Search1api,
    Google,
    Bing,
    Serpapi,
    Serper,
    #[default]
    Duckduckgo,
    Searxng,
}

impl std::fmt::Display for SearchBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchBackendKind::Search1api => "search1api",
            SearchBackendKind::Google => "google",
            SearchBackendKind::Bing => "bing",
            SearchBackendKind::Serpapi => "serpapi",
            SearchBackendKind::Serper => "serper",
            SearchBackendKind::Duckduckgo => "duckduckgo",
            SearchBackendKind::Searxng => "searxng",
        };
        f.write_str(name)
    }
}

/// Web search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackendKind,
    /// Upper bound on results returned to the model
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub search1api: ApiKeyProviderConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub bing: ApiKeyProviderConfig,
    #[serde(default)]
    pub serpapi: ApiKeyProviderConfig,
    #[serde(default)]
    pub serper: SerperConfig,
    #[serde(default)]
    pub duckduckgo: EndpointConfig,
    #[serde(default)]
    pub searxng: SearxngConfig,
}

fn default_max_results() -> usize {
    10
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackendKind::default(),
            max_results: default_max_results(),
            timeout_seconds: default_search_timeout(),
            search1api: ApiKeyProviderConfig::default(),
            google: GoogleConfig::default(),
            bing: ApiKeyProviderConfig::default(),
            serpapi: ApiKeyProviderConfig::default(),
            serper: SerperConfig::default(),
            duckduckgo: EndpointConfig::default(),
            searxng: SearxngConfig::default(),
        }
    }
}

/// Provider authenticated by a single API key
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiKeyProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Programmable search engine id
    #[serde(default)]
    pub cx: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerperConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Country code
    #[serde(default = "default_gl")]
    pub gl: String,
    /// Interface language
    #[serde(default = "default_hl")]
    pub hl: String,
}

fn default_gl() -> String {
    "us".to_string()
}

fn default_hl() -> String {
    "en".to_string()
}

impl Default for SerperConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            gl: default_gl(),
            hl: default_hl(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearxngConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Page crawler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_crawler_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_crawler_timeout")]
    pub timeout_seconds: u64,
}

fn default_crawler_endpoint() -> String {
    "https://crawl.search1api.com".to_string()
}

fn default_crawler_timeout() -> u64 {
    60
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_crawler_endpoint(),
            timeout_seconds: default_crawler_timeout(),
        }
    }
}

/// Stats logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub format: StatsFormat,
}

fn default_stats_enabled() -> bool {
    true
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            format: StatsFormat::default(),
        }
    }
}

/// Stats output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StatsFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load the file if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Check values serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.upstream.url)
            .map_err(|e| ConfigError::Validation(format!("upstream.url '{}': {}", self.upstream.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "upstream.url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.orchestrator.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "orchestrator.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::Validation(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Undefined environment variable '{name}' referenced in configuration")]
    UndefinedVariable { name: String },

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
