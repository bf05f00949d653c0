//! Sitecheck main entry point
//!
//! This is the command-line interface for the Sitecheck crawler.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use sitecheck::checker::{Accept, PageChecker};
use sitecheck::fetch::Fetcher;
use sitecheck::plugin::PluginCollection;
use sitecheck::report::Scribe;
use sitecheck::request::Request;
use sitecheck::spider::spider_for;

/// Sitecheck: a correctness-testing crawler
///
/// Sitecheck crawls a web application or static site from a single seed
/// URL and writes an HTML report of the protocol- and document-level
/// problems it finds. This is a test tool; do not use it on production
/// sites.
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(version)]
#[command(about = "Correctness-testing crawler for web apps and sites", long_about = None)]
struct Cli {
    /// Web app or site to check
    #[arg(value_name = "URL|PATH")]
    url: String,

    /// File to write the HTML report to
    #[arg(value_name = "REPORT")]
    report: PathBuf,

    /// Accept serialization: any (HTML or XHTML) or HTML only
    #[arg(long, value_enum, default_value_t = AcceptArg::Any)]
    accept: AcceptArg,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum AcceptArg {
    Any,
    Html,
}

impl From<AcceptArg> for Accept {
    fn from(arg: AcceptArg) -> Self {
        match arg {
            AcceptArg::Any => Accept::Any,
            AcceptArg::Html => Accept::Html,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("sitecheck=info,warn"),
        1 => EnvFilter::new("sitecheck=debug,info"),
        2 => EnvFilter::new("sitecheck=trace,debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Attempts to turn a command line argument into a full URL.
///
/// Accepts a full HTTP(S) URL, a `host:port` pair, an absolute file path
/// or a path relative to the working directory.
fn detect_url(arg: &str) -> String {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        return arg.to_string();
    }

    if arg.starts_with('/') {
        // Assume absolute file path.
        return format!("file://{arg}");
    }

    let authority = arg.split('/').next().unwrap_or(arg);
    if let Some((_, port)) = authority.split_once(':') {
        if !port.is_empty() && port.chars().all(|ch| ch.is_ascii_digit()) {
            // Host and port without scheme, assume HTTP.
            return format!("http://{arg}");
        }
    }

    // Assume relative file path.
    std::env::current_dir()
        .ok()
        .and_then(|cwd| Url::from_directory_path(cwd).ok())
        .and_then(|base| base.join(arg).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| format!("file://{arg}"))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let first_req = Request::from_url(&detect_url(&cli.url))
        .map_err(|err| anyhow::anyhow!("Bad URL: {err}"))?;
    let base_url = first_req.page_url().to_string();

    let fetcher = Fetcher::new().context("Failed to set up HTTP client")?;
    let (mut spider, robots_report) = spider_for(first_req, &fetcher).await;

    let mut scribe = Scribe::new(&base_url);
    let mut checker = PageChecker::new(cli.accept.into(), fetcher, PluginCollection::default());
    if let Some(report) = robots_report {
        checker.plugins().report_added(&report);
        scribe.add_report(report);
    }

    tracing::info!("Checking \"{base_url}\" and below...");
    while let Some(request) = spider.next_request() {
        let (report, referrers) = checker.check(&request).await;
        spider.add_requests(&request, referrers);
        checker.plugins().report_added(&report);
        scribe.add_report(report);
    }
    tracing::info!("Done checking");

    tracing::info!("Writing report to \"{}\"...", cli.report.display());
    std::fs::write(&cli.report, scribe.present())
        .with_context(|| format!("Failed to write report to \"{}\"", cli.report.display()))?;
    tracing::info!("Done reporting");

    checker.plugins().postprocess(&scribe);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_url_passes_through_http() {
        assert_eq!(detect_url("http://example.com/"), "http://example.com/");
        assert_eq!(detect_url("https://example.com/x"), "https://example.com/x");
    }

    #[test]
    fn test_detect_url_absolute_path() {
        assert_eq!(detect_url("/var/www/site"), "file:///var/www/site");
    }

    #[test]
    fn test_detect_url_host_and_port() {
        assert_eq!(detect_url("localhost:8080"), "http://localhost:8080");
        assert_eq!(
            detect_url("localhost:8080/app"),
            "http://localhost:8080/app"
        );
    }

    #[test]
    fn test_detect_url_relative_path() {
        let url = detect_url("site/index.html");
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/site/index.html"));
    }
}
