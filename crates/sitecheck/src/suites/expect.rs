//! Retrying assertions over a browser session
//!
//! Page state settles asynchronously (injected header/footer, scroll
//! animations, class toggles), so each expectation polls until it holds or
//! [`EXPECT_TIMEOUT`] runs out, and only then fails with the observed value.

use std::future::Future;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::time::sleep;

use crate::ensure;
use crate::error::{CheckError, CheckResult};
use crate::session::BrowserSession;

pub const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);
const EXPECT_POLL: Duration = Duration::from_millis(100);

/// Poll `probe` until it returns true or the timeout passes
pub async fn eventually<F, Fut>(mut probe: F) -> CheckResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CheckResult<bool>>,
{
    let deadline = Instant::now() + EXPECT_TIMEOUT;
    loop {
        if probe().await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(EXPECT_POLL).await;
    }
}

pub async fn visible(page: &dyn BrowserSession, selector: &str) -> CheckResult<()> {
    let ok = eventually(|| page.is_visible(selector)).await?;
    ensure!(ok, "{} should be visible", selector);
    Ok(())
}

pub async fn hidden(page: &dyn BrowserSession, selector: &str) -> CheckResult<()> {
    let ok = eventually(|| async move {
        Ok::<_, CheckError>(!page.is_visible(selector).await?)
    })
    .await?;
    ensure!(ok, "{} should be hidden", selector);
    Ok(())
}

pub async fn in_viewport(page: &dyn BrowserSession, selector: &str) -> CheckResult<()> {
    let ok = eventually(|| page.in_viewport(selector)).await?;
    ensure!(ok, "{} should be in the viewport", selector);
    Ok(())
}

pub async fn title(page: &dyn BrowserSession, expected: &str) -> CheckResult<()> {
    let ok = eventually(|| async move {
        Ok::<_, CheckError>(page.title().await? == expected)
    })
    .await?;
    if !ok {
        let actual = page.title().await?;
        return Err(CheckError::Assertion(format!(
            "Expected title {:?}, got {:?}",
            expected, actual
        )));
    }
    Ok(())
}

pub async fn url_matches(page: &dyn BrowserSession, pattern: &str) -> CheckResult<()> {
    let re = Regex::new(pattern)
        .map_err(|e| CheckError::Assertion(format!("bad URL pattern {}: {}", pattern, e)))?;
    let re = &re;
    let ok = eventually(|| async move {
        Ok::<_, CheckError>(re.is_match(&page.url().await?))
    })
    .await?;
    if !ok {
        let actual = page.url().await?;
        return Err(CheckError::Assertion(format!(
            "URL {} does not match /{}/",
            actual, pattern
        )));
    }
    Ok(())
}

/// Class attribute contains (or lacks) `fragment`, as a substring
pub async fn class_contains(
    page: &dyn BrowserSession,
    selector: &str,
    fragment: &str,
    expected: bool,
) -> CheckResult<()> {
    let probe = || async move {
        let class = page.get_attribute(selector, "class").await?.unwrap_or_default();
        Ok::<_, CheckError>(class.contains(fragment) == expected)
    };
    if !eventually(probe).await? {
        let class = page.get_attribute(selector, "class").await?.unwrap_or_default();
        return Err(CheckError::Assertion(format!(
            "{} class {:?} should {}contain {:?}",
            selector,
            class,
            if expected { "" } else { "not " },
            fragment
        )));
    }
    Ok(())
}

/// Attribute value matches a regex
pub async fn attribute_matches(
    page: &dyn BrowserSession,
    selector: &str,
    name: &str,
    pattern: &str,
) -> CheckResult<()> {
    let re = Regex::new(pattern)
        .map_err(|e| CheckError::Assertion(format!("bad pattern {}: {}", pattern, e)))?;
    let value = page.get_attribute(selector, name).await?;
    ensure!(
        value.as_deref().map(|v| re.is_match(v)).unwrap_or(false),
        "{} [{}] = {:?} does not match /{}/",
        selector,
        name,
        value,
        pattern
    );
    Ok(())
}

/// `window.scrollY` as a float
pub async fn scroll_y(page: &dyn BrowserSession) -> CheckResult<f64> {
    Ok(page.evaluate("window.scrollY").await?.as_f64().unwrap_or(0.0))
}
