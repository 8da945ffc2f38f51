//! Test runner: one static server, selected cases, sequential execution

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::discovery::TargetDiscovery;
use crate::error::{CheckError, CheckResult};
use crate::playwright::{Browser, PlaywrightProvider};
use crate::server::ServerHandle;
use crate::session::SessionProvider;
use crate::suites::{all_cases, Case, CaseBody, CaseKind, Outcome, SessionContext};
use crate::viewport::Viewport;

/// Default location of the JSON report
pub const DEFAULT_REPORT_PATH: &str = "test-results/report.json";

/// Which cases a run includes
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Substring matched against case IDs
    pub keyword: Option<String>,
    pub static_only: bool,
    pub visual_only: bool,
}

impl Selection {
    pub fn includes(&self, kind: CaseKind, id: &str) -> bool {
        if self.static_only && kind != CaseKind::Static {
            return false;
        }
        if self.visual_only && kind != CaseKind::Visual {
            return false;
        }
        match &self.keyword {
            Some(keyword) => id.contains(keyword.as_str()),
            None => true,
        }
    }
}

/// A case bound to the engine it runs in
#[derive(Debug, Clone)]
pub struct PlannedCase {
    pub id: String,
    pub case: Case,
    pub browser: Option<Browser>,
}

/// Expand browser cases per engine and apply the selection, keeping case order.
pub fn plan(cases: Vec<Case>, browsers: &[Browser], selection: &Selection) -> Vec<PlannedCase> {
    let mut planned = Vec::new();
    for case in cases {
        let engines: Vec<Option<Browser>> = if case.kind.needs_browser() {
            browsers.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };
        for browser in engines {
            let id = case.id(browser);
            if selection.includes(case.kind, &id) {
                planned.push(PlannedCase {
                    id,
                    case: case.clone(),
                    browser,
                });
            }
        }
    }
    planned
}

/// Environment-driven skip applied before a case runs
pub fn skip_reason(kind: CaseKind, browser: Option<Browser>) -> Option<&'static str> {
    match browser {
        Some(Browser::Webkit) => Some("WebKit has known flakiness issues"),
        Some(b) if kind == CaseKind::Visual && b != Browser::Chromium => {
            Some("Visual tests use Chromium baselines only")
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed(String),
    Skipped(String),
}

impl CaseStatus {
    /// Fold a case result; missing tools are an environment state, not a regression.
    pub fn from_result(result: CheckResult<Outcome>) -> Self {
        match result {
            Ok(Outcome::Passed) => CaseStatus::Passed,
            Ok(Outcome::Skipped(reason)) => CaseStatus::Skipped(reason),
            Err(CheckError::PlaywrightNotFound(reason)) => {
                CaseStatus::Skipped(format!("Playwright not available: {}", reason))
            }
            Err(CheckError::AuditToolMissing(tool)) => {
                CaseStatus::Skipped(format!("{} not available", tool))
            }
            Err(e) => CaseStatus::Failed(e.to_string()),
        }
    }
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub kind: CaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<Browser>,
    #[serde(flatten)]
    pub status: CaseStatus,
    pub duration_ms: u64,
}

/// Result of running all selected cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, CaseStatus::Failed(_)))
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn write_results(&self, path: &Path) -> CheckResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Results written to: {}", path.display());
        Ok(())
    }
}

/// Orchestrates the static server, browser sessions and case execution
pub struct TestRunner {
    config: HarnessConfig,
    selection: Selection,
    discovery: Arc<TargetDiscovery>,
    provider: Arc<dyn SessionProvider>,
    server: Option<ServerHandle>,
}

impl TestRunner {
    /// Runner backed by Playwright
    pub fn new(config: HarnessConfig, selection: Selection) -> Self {
        let provider = Arc::new(PlaywrightProvider::new(config.browser.clone()));
        Self::with_provider(config, selection, provider)
    }

    pub fn with_provider(
        config: HarnessConfig,
        selection: Selection,
        provider: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            discovery: Arc::new(TargetDiscovery::new(&config)),
            config,
            selection,
            provider,
            server: None,
        }
    }

    pub fn discovery(&self) -> &TargetDiscovery {
        &self.discovery
    }

    /// Start the static server unless it is already running
    pub async fn start_server(&mut self) -> CheckResult<String> {
        if let Some(server) = &self.server {
            return Ok(server.base_url().to_string());
        }
        let server = ServerHandle::start(self.config.site_root.clone(), &self.config.server).await?;
        let base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(base_url)
    }

    pub async fn stop_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop().await;
        }
    }

    /// Run every registered case that matches the selection
    pub async fn run(&mut self) -> CheckResult<TestSuiteResult> {
        let cases = all_cases(&self.config, &self.discovery);
        self.run_cases(cases).await
    }

    pub async fn run_cases(&mut self, cases: Vec<Case>) -> CheckResult<TestSuiteResult> {
        self.config.validate()?;

        let planned = plan(cases, &self.config.browser.browsers, &self.selection);
        let started_at = Utc::now();
        let start = Instant::now();

        let base_url = self.start_server().await?;
        let ctx = Arc::new(SessionContext::new(
            self.config.clone(),
            &base_url,
            self.discovery.clone(),
        )?);

        info!("Running {} test(s)...", planned.len());

        let mut results = Vec::with_capacity(planned.len());
        for planned_case in &planned {
            let result = self.run_planned(&ctx, planned_case).await;
            match &result.status {
                CaseStatus::Passed => info!("✓ {} ({} ms)", result.id, result.duration_ms),
                CaseStatus::Failed(msg) => error!("✗ {} - {}", result.id, msg),
                CaseStatus::Skipped(reason) => debug!("- {} skipped: {}", result.id, reason),
            }
            results.push(result);
        }

        self.stop_server().await;
        self.provider.shutdown().await;

        let count = |pred: fn(&CaseStatus) -> bool| results.iter().filter(|r| pred(&r.status)).count();
        let passed = count(|s| matches!(s, CaseStatus::Passed));
        let failed = count(|s| matches!(s, CaseStatus::Failed(_)));
        let skipped = count(|s| matches!(s, CaseStatus::Skipped(_)));
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(TestSuiteResult {
            started_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    async fn run_planned(&self, ctx: &Arc<SessionContext>, planned: &PlannedCase) -> CaseResult {
        let start = Instant::now();
        let kind = planned.case.kind;

        let status = match skip_reason(kind, planned.browser) {
            Some(reason) => CaseStatus::Skipped(reason.to_string()),
            None => {
                let outcome = AssertUnwindSafe(self.execute(ctx, planned))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(result) => CaseStatus::from_result(result),
                    Err(_) => CaseStatus::Failed("case panicked".to_string()),
                }
            }
        };

        CaseResult {
            id: planned.id.clone(),
            kind,
            browser: planned.browser,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute(&self, ctx: &Arc<SessionContext>, planned: &PlannedCase) -> CheckResult<Outcome> {
        match &planned.case.body {
            CaseBody::Http(body) => body(ctx.clone()).await,
            CaseBody::Browser(body) => {
                let browser = planned.browser.unwrap_or_default();
                let page = self.provider.open(browser, Viewport::CONTEXT_DEFAULT).await?;
                let result = AssertUnwindSafe(body(ctx.clone(), page.clone()))
                    .catch_unwind()
                    .await;
                if let Err(e) = page.close().await {
                    warn!("Failed to close page for {}: {}", planned.id, e);
                }
                // Close first, then let run_planned report the panic
                match result {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        }
    }
}
