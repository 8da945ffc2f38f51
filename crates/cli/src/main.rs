//! sitecheck - runs the MB Secure website test harness
//!
//! Starts the static server, runs the selected checks in the selected
//! browsers and writes a JSON report. Exit codes: 0 all passed, 1 any
//! failure, 2 harness error, 130 interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use sitecheck::runner::DEFAULT_REPORT_PATH;
use sitecheck::{Browser, HarnessConfig, Selection, TestRunner};
use tracing::debug;

mod output;

const EXIT_FAILED: u8 = 1;
const EXIT_HARNESS_ERROR: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BrowserChoice {
    Chromium,
    Firefox,
    Webkit,
    All,
}

impl BrowserChoice {
    fn browsers(self) -> Vec<Browser> {
        match self {
            BrowserChoice::Chromium => vec![Browser::Chromium],
            BrowserChoice::Firefox => vec![Browser::Firefox],
            BrowserChoice::Webkit => vec![Browser::Webkit],
            BrowserChoice::All => Browser::all().to_vec(),
        }
    }
}

/// MB Secure website test runner
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML config file; flags override its values
    #[arg(long, env = "SITECHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the website file tree
    #[arg(long, env = "SITECHECK_SITE_ROOT")]
    site_root: Option<PathBuf>,

    /// Port for the static server (0 picks a free one)
    #[arg(long, env = "SITECHECK_PORT")]
    port: Option<u16>,

    /// Browser(s) to run browser tests in
    #[arg(long, value_enum, default_value = "all")]
    browser: BrowserChoice,

    /// Run browsers with a visible window
    #[arg(long)]
    headed: bool,

    /// Only run tests whose ID contains this text
    #[arg(short, long)]
    keyword: Option<String>,

    /// Run only static tests (no browser needed)
    #[arg(long, conflicts_with = "visual_only")]
    static_only: bool,

    /// Run only visual regression tests
    #[arg(long)]
    visual_only: bool,

    /// Replace visual baselines with the current captures
    #[arg(long)]
    update_snapshots: bool,

    /// Path of the JSON report
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    report: PathBuf,

    /// Skip writing the report
    #[arg(long)]
    no_report: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(self.config.as_deref()).with_context(|| {
            format!(
                "loading config {}",
                self.config
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            )
        })?;

        if let Some(root) = &self.site_root {
            config.site_root = root.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        config.browser.browsers = self.browser.browsers();
        if self.headed {
            config.browser.headless = false;
        }
        if self.update_snapshots {
            config.visual.update_snapshots = true;
        }
        Ok(config)
    }

    fn selection(&self) -> Selection {
        Selection {
            keyword: self.keyword.clone(),
            static_only: self.static_only,
            visual_only: self.visual_only,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_HARNESS_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config()?;
    debug!("Effective config: {:?}", config);

    let browsers: Vec<String> = config
        .browser
        .browsers
        .iter()
        .map(|b| b.to_string())
        .collect();
    output::print_banner(&config.site_root.display().to_string(), &browsers);

    let mut runner = TestRunner::new(config, cli.selection());

    let result = tokio::select! {
        result = runner.run() => result.context("test run aborted")?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            output::print_warning("Tests interrupted by user");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    output::print_summary(&result, cli.verbose);

    if !cli.no_report {
        result
            .write_results(&cli.report)
            .with_context(|| format!("writing report {}", cli.report.display()))?;
        output::print_info(&format!("Report: {}", cli.report.display()));
    }

    if result.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "sitecheck",
            "--site-root",
            "/srv/site",
            "--port",
            "0",
            "--browser",
            "firefox",
            "--headed",
            "--update-snapshots",
            "-k",
            "homepage",
        ]);
        let config = cli.config().unwrap();
        assert_eq!(config.site_root, PathBuf::from("/srv/site"));
        assert_eq!(config.server.port, 0);
        assert_eq!(config.browser.browsers, vec![Browser::Firefox]);
        assert!(!config.browser.headless);
        assert!(config.visual.update_snapshots);
        assert_eq!(cli.selection().keyword.as_deref(), Some("homepage"));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sitecheck"]);
        assert_eq!(cli.browser, BrowserChoice::All);
        assert_eq!(cli.report, PathBuf::from("test-results/report.json"));
        let config = cli.config().unwrap();
        assert_eq!(config.browser.browsers.len(), 3);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_static_and_visual_only_conflict() {
        let parsed = Cli::try_parse_from(["sitecheck", "--static-only", "--visual-only"]);
        assert!(parsed.is_err());
    }
}
