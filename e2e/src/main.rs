//! search-proxy end-to-end tests
//!
//! Starts the mock services (upstream chat API, SearXNG, crawl service) on one
//! port, launches the proxy binary pointed at them, and runs every case.
//!
//!   cargo run                        # build output in ../target, all cases
//!   cargo run -- toolcall/           # only cases whose name contains "toolcall/"
//!   cargo run -- --list
//!   cargo run -- --attach 127.0.0.1:3014   # proxy you started yourself

mod backend;
mod client;
mod runner;
mod tests;
mod types;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::process::{Child, Command};

use backend::Mocks;
use client::ProxyClient;
use runner::TestContext;

const PROXY_BINS: &[&str] = &["../target/release/search-proxy", "../target/debug/search-proxy"];

/// The config's search and crawler endpoints point at this port
const MOCK_PORT: u16 = 18080;
const PROXY_PORT: u16 = 18066;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "e2e", about = "End-to-end tests for search-proxy")]
struct Cli {
    /// Run only cases whose name contains this text
    filter: Option<String>,

    /// Print the cases and exit
    #[arg(long)]
    list: bool,

    /// Test a proxy that is already running at this address instead of
    /// launching one. Its upstream, search and crawler must use the mock port.
    #[arg(long, value_name = "ADDR", conflicts_with = "bin")]
    attach: Option<String>,

    /// Proxy binary; defaults to the release, then the debug build
    #[arg(long)]
    bin: Option<PathBuf>,

    /// Proxy config passed to the launched binary
    #[arg(long, default_value = "test_configs/proxy.yaml")]
    config: PathBuf,

    /// Port of the mock upstream, SearXNG and crawl service
    #[arg(long, default_value_t = MOCK_PORT)]
    mock_port: u16,

    /// Listen port for the launched proxy
    #[arg(long, default_value_t = PROXY_PORT)]
    proxy_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let cases = tests::all_tests();

    if cli.list {
        runner::list(&cases);
        return Ok(ExitCode::SUCCESS);
    }

    let mocks = Mocks::start(cli.mock_port).await?;
    println!("Mock services on 127.0.0.1:{}", cli.mock_port);

    // The child handle lives until the run ends; kill_on_drop stops the proxy
    let (proxy, _child) = match cli.attach {
        Some(addr) => (ProxyClient::new(&addr)?, None),
        None => {
            let bin = match cli.bin {
                Some(bin) => bin,
                None => find_proxy_bin()?,
            };
            let mut child = launch_proxy(&bin, &cli.config, cli.proxy_port, cli.mock_port)?;
            let proxy = ProxyClient::new(&format!("127.0.0.1:{}", cli.proxy_port))?;
            wait_until_healthy(&proxy, &mut child).await?;
            (proxy, Some(child))
        }
    };

    let ctx = TestContext { proxy, mocks };
    let report = runner::run(&cases, &ctx, cli.filter.as_deref()).await;

    Ok(if report.ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn find_proxy_bin() -> anyhow::Result<PathBuf> {
    PROXY_BINS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "search-proxy binary not found ({}); run `cargo build` in the repository root",
                PROXY_BINS.join(", ")
            )
        })
}

/// Launch the proxy with its upstream overridden to the mock port
fn launch_proxy(bin: &Path, config: &Path, proxy_port: u16, mock_port: u16) -> anyhow::Result<Child> {
    println!("Launching {} on port {}", bin.display().to_string().cyan(), proxy_port);
    Command::new(bin)
        .arg("--config")
        .arg(config)
        .arg("run")
        .arg("--port")
        .arg(proxy_port.to_string())
        .arg("--upstream-url")
        .arg(format!("http://127.0.0.1:{}", mock_port))
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("launching {}", bin.display()))
}

/// Poll /health until it answers, failing fast if the proxy exits
async fn wait_until_healthy(proxy: &ProxyClient, child: &mut Child) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            anyhow::bail!("search-proxy exited during startup with {}", status);
        }
        if proxy.is_healthy().await {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("search-proxy not healthy on {} after {:?}", proxy.addr(), STARTUP_TIMEOUT)
}
