//! search-proxy: OpenAI-compatible chat proxy with web search tools
//!
//! Sits between a chat client and an upstream chat-completion API, lets the
//! model call `search` and `crawler`, and streams the final answer back.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use search_proxy::{config::AppConfig, create_default_registry, proxy::build_http_client, run_server};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "search-proxy")]
#[command(version)]
#[command(about = "OpenAI-compatible chat proxy with web search and crawl tools")]
#[command(long_about = "
search-proxy forwards chat completions to an OpenAI-compatible API and gives
the model two tools:
  - search:  web search through the configured backend
  - crawler: fetch and extract a page by URL

Tool calls are executed by the proxy and the conversation is continued
upstream until the model answers.

Example usage:
  search-proxy run --config config.yaml
  search-proxy list-tools --verbose
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream URL (e.g., "https://api.openai.com")
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// List the tools offered to the model
    ListTools {
        /// Show descriptions and argument schemas
        #[arg(short, long)]
        verbose: bool,
    },

    /// Test connection to the upstream API
    TestUpstream,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run { port, upstream_url } => run_proxy(&cli.config, port, upstream_url).await,
        Commands::CheckConfig => check_config(&cli.config),
        Commands::ListTools { verbose } => list_tools(&cli.config, verbose),
        Commands::TestUpstream => test_upstream(&cli.config).await,
    }
}

fn init_tracing(level: Option<LogLevel>, format: LogFormat) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level.to_string()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_proxy(config_path: &Path, port: Option<u16>, upstream_url: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(url) = upstream_url {
        config.upstream.url = url;
        config.validate()?;
    }

    tracing::info!(
        config = %config_path.display(),
        search_backend = %config.search.backend,
        max_iterations = config.orchestrator.max_iterations,
        parallel_tool_calls = config.tools.parallel_tool_calls,
        "Configuration loaded"
    );

    run_server(config).await
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Configuration file is valid\n");
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("\nUpstream:");
    println!("  URL: {}", config.upstream.url);
    println!("  TLS: {}", if config.upstream.is_tls() { "enabled" } else { "disabled" });
    if let Some(ref tls) = config.upstream.tls {
        if tls.accept_invalid_certs {
            println!("  TLS: Accepting invalid certificates");
        }
        if let Some(ref ca) = tls.ca_cert_path {
            println!("  TLS CA: {}", ca);
        }
    }
    println!("  Timeout: {}s", config.upstream.timeout_seconds);
    println!(
        "  Fallback API key: {}",
        if config.upstream.api_key.is_some() { "set" } else { "not set" }
    );
    println!("\nOrchestrator:");
    println!("  Max tool rounds: {}", config.orchestrator.max_iterations);
    println!("  Parallel tool calls: {}", config.tools.parallel_tool_calls);
    println!("\nTools:");
    for (name, module) in &config.tools.modules {
        println!("  {} : {}", name, module.enabled);
    }
    println!("\nSearch:");
    println!("  Backend: {}", config.search.backend);
    println!("  Max results: {}", config.search.max_results);
    match search_proxy::search::build_backend(&config.search, reqwest::Client::new()) {
        Ok(_) => println!("  ✓ Backend credentials present"),
        Err(e) => println!("  ✗ {}", e),
    }
    println!("\nCrawler:");
    println!("  Endpoint: {}", config.crawler.endpoint);
    println!("\nStats:");
    println!("  Enabled: {}", config.stats.enabled);
    println!("  Format: {:?}", config.stats.format);
    Ok(())
}

fn list_tools(config_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let registry = create_default_registry(&config, build_http_client(&config)?)?;

    println!("Available tools:\n");

    for tool in registry.list_tools() {
        let enabled = registry.is_enabled(tool.name());
        if verbose {
            println!("  {}:", tool.name());
            println!("    {}", tool.description());
            println!("    Enabled: {}", enabled);
            println!("    Parameters: {}", serde_json::to_string_pretty(&tool.parameters())?);
            println!();
        } else {
            let status = if enabled { "[enabled]" } else { "[disabled]" };
            println!("  {:10} {}", tool.name(), status);
        }
    }

    if verbose {
        println!("\nTo enable/disable tools, edit your config.yaml:");
        println!("\ntools:");
        println!("  modules:");
        println!("    crawler:");
        println!("      enabled: false");
    }
    Ok(())
}

async fn test_upstream(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let client = build_http_client(&config)?;
    let models_url = format!("{}/v1/models", config.upstream.base_url());

    println!("Testing connection to upstream: {}", models_url);

    let mut request = client.get(&models_url).timeout(std::time::Duration::from_secs(10));
    if let Some(ref key) = config.upstream.api_key {
        request = request.bearer_auth(key);
    }

    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            println!("✗ Failed to connect to upstream: {}", e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        println!("✗ Upstream returned status: {}", resp.status());
        if config.upstream.api_key.is_none() {
            println!("  (no upstream.api_key configured; clients normally supply their own)");
        }
        return Ok(());
    }

    println!("✓ Upstream is reachable");
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    if let Some(data) = body.get("data").and_then(|d| d.as_array()) {
        println!("  Available models: {}", data.len());
        for model in data.iter().take(5) {
            if let Some(id) = model.get("id").and_then(|i| i.as_str()) {
                println!("    - {}", id);
            }
        }
    }
    Ok(())
}
