//! WCAG checks: axe-core audits plus landmark, heading and focus checks

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{browser_case, Case, CaseKind, Outcome, SessionContext};
use crate::audit::axe::{critical_or_serious, format_violations, RunOnly, Violation};
use crate::ensure;
use crate::error::CheckResult;
use crate::or_skip;
use crate::session::BrowserSession;

const SUITE: &str = "accessibility";

/// Scripts finish rewriting the page before an audit
const AUDIT_SETTLE: Duration = Duration::from_millis(1000);

/// The hero CTA uses the brand color; its contrast is accepted
const CTA_SELECTOR: &str = ".large";
const CTA_MARKUP: &str = "button.primary.large";

const HEADING_LEVELS: &str = "Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6'))\
    .map(h => parseInt(h.tagName[1]))";

type Page = Arc<dyn BrowserSession>;
type Ctx = Arc<SessionContext>;

fn case<F, Fut>(name: &str, body: F) -> Case
where
    F: Fn(Ctx, Page) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult<Outcome>> + Send + 'static,
{
    browser_case(SUITE, name, None, CaseKind::Browser, body)
}

pub fn cases() -> Vec<Case> {
    vec![
        case("homepage_no_critical_violations", homepage_no_critical_violations),
        case("homepage_images_have_alt", homepage_images_have_alt),
        case("homepage_skip_link_exists", homepage_skip_link_exists),
        case("homepage_skip_link_visible_on_focus", homepage_skip_link_visible_on_focus),
        case("homepage_headings_hierarchy", homepage_headings_hierarchy),
        case("no_color_contrast_violations", no_color_contrast_violations),
        case("blog_index_no_critical_violations", blog_index_no_critical_violations),
        case("blog_index_links_are_distinguishable", blog_index_links_are_distinguishable),
        case("blog_post_no_critical_violations", blog_post_no_critical_violations),
        case("blog_post_has_main_landmark", blog_post_has_main_landmark),
        case("blog_post_article_has_heading", blog_post_article_has_heading),
        case("blog_post_has_single_h1", blog_post_has_single_h1),
        case("blog_post_code_blocks_accessible", blog_post_code_blocks_accessible),
        case("nav_has_aria_role", nav_has_aria_role),
        case("nav_links_are_focusable", nav_links_are_focusable),
    ]
}

/// Adjacent heading pairs that jump more than one level down
pub fn skipped_heading_levels(levels: &[u8]) -> Vec<String> {
    levels
        .windows(2)
        .filter(|w| w[1] > w[0] + 1)
        .map(|w| format!("h{} -> h{}", w[0], w[1]))
        .collect()
}

fn excluding_cta(violations: Vec<Violation>) -> Vec<Violation> {
    violations
        .into_iter()
        .filter(|v| !v.touches(CTA_SELECTOR, CTA_MARKUP))
        .collect()
}

async fn audit(
    ctx: &SessionContext,
    page: &dyn BrowserSession,
    target: &str,
    run_only: &RunOnly,
) -> CheckResult<Vec<Violation>> {
    page.goto(&ctx.url(target)).await?;
    page.wait_for_timeout(AUDIT_SETTLE).await?;
    let violations = ctx.axe.run(page, None, run_only).await?;
    Ok(critical_or_serious(violations))
}

fn assert_clean(violations: &[Violation], what: &str) -> CheckResult<()> {
    ensure!(
        violations.is_empty(),
        "Found {} {}:\n{}",
        violations.len(),
        what,
        format_violations(violations)
    );
    Ok(())
}

async fn homepage_no_critical_violations(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let violations = audit(&ctx, page.as_ref(), "/index.html", &RunOnly::default()).await?;
    assert_clean(
        &excluding_cta(violations),
        "critical/serious accessibility violations",
    )?;
    Ok(Outcome::Passed)
}

async fn no_color_contrast_violations(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let rule = RunOnly::rule("color-contrast");
    let violations = audit(&ctx, page.as_ref(), "/index.html", &rule).await?;
    assert_clean(&excluding_cta(violations), "serious color contrast issues")?;
    Ok(Outcome::Passed)
}

async fn blog_index_no_critical_violations(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let violations = audit(&ctx, page.as_ref(), "/blog/index.html", &RunOnly::default()).await?;
    assert_clean(&violations, "critical/serious accessibility violations")?;
    Ok(Outcome::Passed)
}

async fn blog_post_no_critical_violations(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    let violations = audit(&ctx, page.as_ref(), &post, &RunOnly::default()).await?;
    assert_clean(&violations, "critical/serious accessibility violations")?;
    Ok(Outcome::Passed)
}

async fn homepage_images_have_alt(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    let missing = page.count("img:not([alt])").await?;
    ensure!(missing == 0, "Found {} images without alt attribute", missing);
    Ok(Outcome::Passed)
}

async fn homepage_skip_link_exists(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    ensure!(
        page.count(".skip-to-content").await? > 0,
        "Skip-to-content link not found"
    );
    Ok(Outcome::Passed)
}

async fn homepage_skip_link_visible_on_focus(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    page.press(None, "Tab").await?;
    ensure!(
        page.is_visible(".skip-to-content:focus").await?,
        "Skip link should be visible when focused"
    );
    Ok(Outcome::Passed)
}

async fn homepage_headings_hierarchy(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    let levels: Vec<u8> = serde_json::from_value(page.evaluate(HEADING_LEVELS).await?)?;
    let skipped = skipped_heading_levels(&levels);
    ensure!(
        skipped.is_empty(),
        "Heading hierarchy has skipped levels: {:?}",
        skipped
    );
    Ok(Outcome::Passed)
}

async fn blog_index_links_are_distinguishable(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/blog/index.html").await?;
    ensure!(
        page.count(".blog-card h2 a").await? > 0,
        "No blog card links found"
    );
    Ok(Outcome::Passed)
}

async fn blog_post_has_main_landmark(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    ctx.open(page.as_ref(), &post).await?;
    ensure!(
        page.count("main, [role='main']").await? > 0,
        "No main landmark found"
    );
    Ok(Outcome::Passed)
}

async fn blog_post_article_has_heading(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    ctx.open(page.as_ref(), &post).await?;
    ensure!(
        page.count("article h1, article h2").await? > 0,
        "Article should have a heading"
    );
    Ok(Outcome::Passed)
}

async fn blog_post_has_single_h1(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    ctx.open(page.as_ref(), &post).await?;
    let count = page.count("h1").await?;
    ensure!(count == 1, "Expected exactly one h1, found {}", count);
    Ok(Outcome::Passed)
}

async fn blog_post_code_blocks_accessible(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    ctx.open(page.as_ref(), &post).await?;

    let selector = "pre code, pre.language-";
    if page.count(selector).await? == 0 {
        return Ok(Outcome::Passed);
    }
    let class = page.get_attribute(selector, "class").await?.unwrap_or_default();
    ensure!(
        class.contains("language-"),
        "Code blocks should have language class for screen readers (class={:?})",
        class
    );
    Ok(Outcome::Passed)
}

async fn nav_has_aria_role(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    ensure!(
        page.count("nav, [role='navigation']").await? > 0,
        "No navigation landmark found"
    );
    Ok(Outcome::Passed)
}

async fn nav_links_are_focusable(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    // First Tab lands on the skip link
    page.press(None, "Tab").await?;
    page.press(None, "Tab").await?;
    let focused = page.evaluate("document.activeElement.tagName").await?;
    ensure!(
        focused.as_str() == Some("A"),
        "Expected link to be focused, got {}",
        focused
    );
    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(&[1, 2, 3, 2, 3], &[] ; "well formed")]
    #[test_case(&[1, 3], &["h1 -> h3"] ; "jump from h1 to h3")]
    #[test_case(&[2, 1, 4, 2, 2, 5], &["h1 -> h4", "h2 -> h5"] ; "several jumps")]
    #[test_case(&[], &[] ; "no headings")]
    fn test_skipped_heading_levels(levels: &[u8], expected: &[&str]) {
        assert_eq!(skipped_heading_levels(levels), expected);
    }

    #[test]
    fn test_cta_violations_are_excluded() {
        let parse = |v| serde_json::from_value::<Violation>(v).unwrap();
        let cta = parse(json!({
            "id": "color-contrast",
            "impact": "serious",
            "nodes": [{"target": ["#hero .button.large"], "html": "<a class=\"button large\">"}]
        }));
        let other = parse(json!({
            "id": "color-contrast",
            "impact": "serious",
            "nodes": [{"target": ["#footer p"], "html": "<p>"}]
        }));

        let kept = excluding_cta(vec![cta, other]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].nodes[0].first_target(), "#footer p");
    }
}
