//! Test case registry
//!
//! Every check is a [`Case`]: an async body plus the identity the runner
//! reports it under. HTTP cases run once; browser cases are expanded per
//! engine by the runner. Parametrized cases carry the target path as their
//! parameter, and since discovery is sorted the resulting IDs are stable.

pub mod accessibility;
pub mod blog;
pub mod browser;
pub mod expect;
pub mod performance;
pub mod responsive;
pub mod static_checks;
pub mod visual;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::audit::{AxeAudit, LighthouseRunner};
use crate::config::HarnessConfig;
use crate::discovery::TargetDiscovery;
use crate::error::CheckResult;
use crate::playwright::Browser;
use crate::reachability::LinkChecker;
use crate::session::BrowserSession;
use crate::viewport::Viewport;
use crate::visual::SnapshotStore;

/// Non-failing result of a case; failures are `Err`
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    Skipped(String),
}

/// Selection group a case belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// Plain HTTP against the static server
    Static,
    /// DOM and interaction checks in a browser
    Browser,
    /// Screenshot baselines
    Visual,
    /// Lighthouse audits
    Performance,
}

impl CaseKind {
    pub fn needs_browser(&self) -> bool {
        matches!(self, CaseKind::Browser | CaseKind::Visual)
    }
}

pub type HttpFn =
    Arc<dyn Fn(Arc<SessionContext>) -> BoxFuture<'static, CheckResult<Outcome>> + Send + Sync>;

pub type BrowserFn = Arc<
    dyn Fn(Arc<SessionContext>, Arc<dyn BrowserSession>) -> BoxFuture<'static, CheckResult<Outcome>>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub enum CaseBody {
    Http(HttpFn),
    Browser(BrowserFn),
}

#[derive(Clone)]
pub struct Case {
    pub suite: &'static str,
    pub name: String,
    pub param: Option<String>,
    pub kind: CaseKind,
    pub body: CaseBody,
}

impl Case {
    /// `suite::name`, `suite::name[param]`, `suite::name[param-browser]`
    pub fn id(&self, browser: Option<Browser>) -> String {
        let params: Vec<&str> = self
            .param
            .as_deref()
            .into_iter()
            .chain(browser.map(|b| b.as_str()))
            .collect();

        if params.is_empty() {
            format!("{}::{}", self.suite, self.name)
        } else {
            format!("{}::{}[{}]", self.suite, self.name, params.join("-"))
        }
    }
}

impl fmt::Debug for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("id", &self.id(None))
            .field("kind", &self.kind)
            .finish()
    }
}

pub fn http_case<F, Fut>(
    suite: &'static str,
    name: &str,
    param: Option<String>,
    kind: CaseKind,
    body: F,
) -> Case
where
    F: Fn(Arc<SessionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult<Outcome>> + Send + 'static,
{
    Case {
        suite,
        name: name.to_string(),
        param,
        kind,
        body: CaseBody::Http(Arc::new(move |ctx| body(ctx).boxed())),
    }
}

pub fn browser_case<F, Fut>(
    suite: &'static str,
    name: &str,
    param: Option<String>,
    kind: CaseKind,
    body: F,
) -> Case
where
    F: Fn(Arc<SessionContext>, Arc<dyn BrowserSession>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult<Outcome>> + Send + 'static,
{
    Case {
        suite,
        name: name.to_string(),
        param,
        kind,
        body: CaseBody::Browser(Arc::new(move |ctx, page| body(ctx, page).boxed())),
    }
}

/// Every registered case, in suite order
pub fn all_cases(config: &HarnessConfig, discovery: &TargetDiscovery) -> Vec<Case> {
    let mut cases = Vec::new();
    cases.extend(static_checks::cases(config, discovery));
    cases.extend(browser::cases());
    cases.extend(responsive::cases());
    cases.extend(blog::cases());
    cases.extend(accessibility::cases());
    cases.extend(visual::cases(discovery));
    cases.extend(performance::cases());
    cases
}

/// State shared by every case of one run
pub struct SessionContext {
    pub config: HarnessConfig,
    pub base_url: String,
    pub discovery: Arc<TargetDiscovery>,
    pub links: LinkChecker,
    pub snapshots: SnapshotStore,
    pub axe: AxeAudit,
    pub lighthouse: LighthouseRunner,
    lighthouse_available: OnceCell<bool>,
}

impl SessionContext {
    pub fn new(
        config: HarnessConfig,
        base_url: &str,
        discovery: Arc<TargetDiscovery>,
    ) -> CheckResult<Self> {
        let links = LinkChecker::new(base_url, &config.http)?;
        let snapshots = SnapshotStore::from_settings(&config.visual);
        let axe = AxeAudit::new(
            config.axe_script_url.clone(),
            Duration::from_millis(config.browser.command_timeout_ms),
        );
        let lighthouse = LighthouseRunner::new(&config.lighthouse);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            discovery,
            links,
            snapshots,
            axe,
            lighthouse,
            lighthouse_available: OnceCell::new(),
        })
    }

    pub fn url(&self, target: &str) -> String {
        format!("{}{}", self.base_url, target)
    }

    /// Representative post, or the skip reason when there is none
    pub fn sample_post(&self) -> Result<String, Outcome> {
        self.discovery
            .sample_content_page()
            .map(String::from)
            .ok_or_else(|| Outcome::Skipped("No content pages discovered".to_string()))
    }

    /// Navigate to `target` and wait the settle delay
    pub async fn open(&self, page: &dyn BrowserSession, target: &str) -> CheckResult<()> {
        page.goto(&self.url(target)).await?;
        page.wait_for_timeout(self.config.browser.settle()).await
    }

    /// Resize, then [`open`](Self::open)
    pub async fn open_at(
        &self,
        page: &dyn BrowserSession,
        viewport: Viewport,
        target: &str,
    ) -> CheckResult<()> {
        page.set_viewport(viewport).await?;
        self.open(page, target).await
    }

    /// Probe for the Lighthouse CLI once per session
    pub async fn lighthouse_available(&self) -> bool {
        *self
            .lighthouse_available
            .get_or_init(|| async {
                let available = self.lighthouse.is_available().await;
                if !available {
                    info!("Lighthouse CLI not found; performance cases will be skipped");
                }
                available
            })
            .await
    }
}

/// Unwrap a `Result<T, Outcome>` or return the outcome from the case
#[macro_export]
macro_rules! or_skip {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(outcome) => return Ok(outcome),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(param: Option<&str>) -> Case {
        http_case(
            "static",
            "page_returns_200",
            param.map(String::from),
            CaseKind::Static,
            |_ctx| async { Ok(Outcome::Passed) },
        )
    }

    #[test]
    fn test_case_ids() {
        assert_eq!(case(None).id(None), "static::page_returns_200");
        assert_eq!(
            case(Some("/index.html")).id(None),
            "static::page_returns_200[/index.html]"
        );
        assert_eq!(
            case(Some("/index.html")).id(Some(Browser::Firefox)),
            "static::page_returns_200[/index.html-firefox]"
        );
        assert_eq!(
            case(None).id(Some(Browser::Chromium)),
            "static::page_returns_200[chromium]"
        );
    }

    #[test]
    fn test_kinds_needing_a_browser() {
        assert!(CaseKind::Browser.needs_browser());
        assert!(CaseKind::Visual.needs_browser());
        assert!(!CaseKind::Static.needs_browser());
        assert!(!CaseKind::Performance.needs_browser());
    }
}
