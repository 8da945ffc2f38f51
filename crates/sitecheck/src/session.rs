//! Capability set the checks need from a browser page

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckResult;
use crate::playwright::Browser;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Element to capture; `None` captures the page
    pub selector: Option<String>,

    /// Capture the whole document height (page captures only)
    pub full_page: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One browser page in its own context.
///
/// Selector-based queries act on the first match, except `count`.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> CheckResult<()>;
    async fn title(&self) -> CheckResult<String>;
    async fn url(&self) -> CheckResult<String>;
    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()>;

    /// Fixed settle delay inside the page
    async fn wait_for_timeout(&self, duration: Duration) -> CheckResult<()>;

    /// Wait until the page URL matches a glob such as `**/blog/**`
    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> CheckResult<()>;

    /// Wait until a JS expression evaluates truthy
    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> CheckResult<()>;

    async fn evaluate(&self, expression: &str) -> CheckResult<serde_json::Value>;

    async fn count(&self, selector: &str) -> CheckResult<usize>;
    async fn is_visible(&self, selector: &str) -> CheckResult<bool>;

    /// Whether any part of the element intersects the viewport
    async fn in_viewport(&self, selector: &str) -> CheckResult<bool>;

    async fn get_attribute(&self, selector: &str, name: &str) -> CheckResult<Option<String>>;
    async fn text_content(&self, selector: &str) -> CheckResult<Option<String>>;
    async fn bounding_box(&self, selector: &str) -> CheckResult<Option<BoundingBox>>;

    async fn click(&self, selector: &str) -> CheckResult<()>;
    async fn hover(&self, selector: &str) -> CheckResult<()>;
    async fn focus(&self, selector: &str) -> CheckResult<()>;

    /// Press a key on an element, or on the page when `selector` is `None`
    async fn press(&self, selector: Option<&str>, key: &str) -> CheckResult<()>;

    /// Load a third-party script into the page
    async fn add_script_tag(&self, url: &str) -> CheckResult<()>;

    async fn screenshot(&self, options: &ScreenshotOptions) -> CheckResult<Vec<u8>>;

    /// Release the page and its context
    async fn close(&self) -> CheckResult<()> {
        Ok(())
    }

    /// Class attribute split into tokens
    async fn classes(&self, selector: &str) -> CheckResult<Vec<String>> {
        Ok(self
            .get_attribute(selector, "class")
            .await?
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default())
    }

    async fn has_class(&self, selector: &str, class: &str) -> CheckResult<bool> {
        Ok(self.classes(selector).await?.iter().any(|c| c == class))
    }
}

/// Source of browser pages, one per test case
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a page in a fresh context of `browser`.
    ///
    /// `CheckError::PlaywrightNotFound` means the engine cannot run here.
    async fn open(&self, browser: Browser, viewport: Viewport) -> CheckResult<Arc<dyn BrowserSession>>;

    /// Stop every browser this provider started
    async fn shutdown(&self);
}
