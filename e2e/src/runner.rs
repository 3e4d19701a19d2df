//! Runs registered cases one after another against a live proxy

use colored::Colorize;
use futures::future::BoxFuture;
use std::time::Instant;

use crate::backend::Mocks;
use crate::client::ProxyClient;

pub type CaseFn = Box<dyn Fn(TestContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
    pub run: CaseFn,
}

/// What a case gets: the proxy under test and the services behind it
#[derive(Clone)]
pub struct TestContext {
    pub proxy: ProxyClient,
    pub mocks: Mocks,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct Report {
    pub passed: usize,
    pub failures: Vec<(&'static str, String)>,
}

impl Report {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every case whose name contains `filter`. Mock state is reset before
/// each case so queued responses never leak between cases.
pub async fn run(cases: &[TestCase], ctx: &TestContext, filter: Option<&str>) -> Report {
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
        .collect();

    println!(
        "\n{} {} case(s) against {}\n",
        "search-proxy e2e:".bold(),
        selected.len(),
        ctx.proxy.addr().cyan()
    );

    let mut report = Report::default();
    for case in selected {
        ctx.mocks.reset();
        let started = Instant::now();
        let result = (case.run)(ctx.clone()).await;
        let elapsed = started.elapsed().as_millis();

        match result {
            Ok(()) => {
                report.passed += 1;
                println!("  {} {} {}", "ok".green(), case.name, format!("{}ms", elapsed).dimmed());
            }
            Err(e) => {
                println!("  {} {} {}", "FAIL".red().bold(), case.name, format!("{}ms", elapsed).dimmed());
                report.failures.push((case.name, format!("{:#}", e)));
            }
        }
    }

    if !report.failures.is_empty() {
        println!("\n{}", "Failures:".red().bold());
        for (name, error) in &report.failures {
            println!("  {}\n    {}", name.bold(), error);
        }
    }

    let summary = format!("\n{} passed, {} failed\n", report.passed, report.failures.len());
    if report.ok() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }

    report
}

pub fn list(cases: &[TestCase]) {
    let width = cases.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for case in cases {
        let name = format!("{:width$}", case.name, width = width);
        println!("{}  {}", name.cyan(), case.description);
    }
}
