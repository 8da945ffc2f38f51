//! Blog pagination, code blocks, cards and the image lightbox

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::browser::NAV_TIMEOUT;
use super::expect;
use super::{browser_case, Case, CaseKind, Outcome, SessionContext};
use crate::ensure;
use crate::error::CheckResult;
use crate::or_skip;
use crate::session::BrowserSession;
use crate::viewport::Viewport;

const SUITE: &str = "blog";

const LIGHTBOX_SETTLE: Duration = Duration::from_millis(500);

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
        case("pagination_exists", pagination_exists),
        case("pagination_page_2_link", pagination_page_2_link),
        case("pagination_next_link", pagination_next_link),
        case("pagination_back_to_page_1", pagination_back_to_page_1),
        case("code_blocks_visible", code_blocks_visible),
        case("code_blocks_highlighted", code_blocks_highlighted),
        case("code_blocks_scroll_on_mobile", code_blocks_scroll_on_mobile),
        case("blog_card_navigates_to_post", blog_card_navigates_to_post),
        case("post_logo_navigates_home", post_logo_navigates_home),
        case("lightbox_links_to_webp", lightbox_links_to_webp),
        case("lightbox_opens_on_click", lightbox_opens_on_click),
        case("lightbox_closes_on_button", lightbox_closes_on_button),
        case("lightbox_closes_on_escape", lightbox_closes_on_escape),
    ]
}

async fn pagination_exists(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/index.html").await?;
    expect::visible(page, ".blog-pagination").await?;
    Ok(Outcome::Passed)
}

async fn follow_to_page_2(ctx: Ctx, page: Page, selector: &str) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/index.html").await?;
    page.click(selector).await?;
    page.wait_for_url("**/page/2/**", NAV_TIMEOUT).await?;
    expect::title(page, "Blog - Page 2 - MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn pagination_page_2_link(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    follow_to_page_2(ctx, page, ".blog-pagination a[href*='page/2']").await
}

async fn pagination_next_link(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    follow_to_page_2(ctx, page, ".blog-pagination a.next").await
}

async fn pagination_back_to_page_1(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/page/2/index.html").await?;
    page.click(".blog-pagination a[href*='/blog/index.html']").await?;
    page.wait_for_url("**/blog/index.html", NAV_TIMEOUT).await?;
    expect::title(page, "Blog - MB Secure").await?;
    Ok(Outcome::Passed)
}

/// Sample post, or a skip when it carries no code blocks
async fn open_post_with_code(
    ctx: &SessionContext,
    page: &dyn BrowserSession,
    viewport: Option<Viewport>,
) -> CheckResult<Result<(), Outcome>> {
    let post = match ctx.sample_post() {
        Ok(post) => post,
        Err(outcome) => return Ok(Err(outcome)),
    };
    match viewport {
        Some(v) => ctx.open_at(page, v, &post).await?,
        None => ctx.open(page, &post).await?,
    }
    if page.count("pre code").await? == 0 {
        return Ok(Err(Outcome::Skipped(format!("{} has no code blocks", post))));
    }
    Ok(Ok(()))
}

async fn code_blocks_visible(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_code(&ctx, page, None).await?);
    expect::visible(page, "pre code").await?;
    Ok(Outcome::Passed)
}

async fn code_blocks_highlighted(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_code(&ctx, page, None).await?);
    let highlighted = page.count("pre code[class*='language-']").await?;
    ensure!(highlighted > 0, "No code block carries a language- class");
    Ok(Outcome::Passed)
}

async fn code_blocks_scroll_on_mobile(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_code(&ctx, page, Some(Viewport::new(375, 667))).await?);

    let overflow = page
        .evaluate("getComputedStyle(document.querySelector('pre')).overflowX")
        .await?;
    let overflow = overflow.as_str().unwrap_or_default();
    ensure!(
        overflow == "auto" || overflow == "scroll",
        "Code blocks should scroll horizontally on mobile (overflow-x: {:?})",
        overflow
    );
    Ok(Outcome::Passed)
}

async fn blog_card_navigates_to_post(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/index.html").await?;
    if page.count(".blog-card a").await? == 0 {
        return Ok(Outcome::Skipped("Blog index lists no cards".to_string()));
    }
    page.click(".blog-card a").await?;
    page.wait_for_url("**/blog/20*/**", NAV_TIMEOUT).await?;
    expect::visible(page, "article").await?;
    Ok(Outcome::Passed)
}

async fn post_logo_navigates_home(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    let page = page.as_ref();
    ctx.open(page, &post).await?;
    page.click("#nav .nav-logo").await?;
    page.wait_for_timeout(ctx.config.browser.settle()).await?;
    expect::url_matches(page, r"/(index\.html)?$").await?;
    Ok(Outcome::Passed)
}

/// Sample post, or a skip when it has no lightbox images
async fn open_post_with_lightbox(
    ctx: &SessionContext,
    page: &dyn BrowserSession,
) -> CheckResult<Result<(), Outcome>> {
    let post = match ctx.sample_post() {
        Ok(post) => post,
        Err(outcome) => return Ok(Err(outcome)),
    };
    ctx.open(page, &post).await?;
    if page.count("a.glightbox").await? == 0 {
        return Ok(Err(Outcome::Skipped(format!("{} has no lightbox images", post))));
    }
    Ok(Ok(()))
}

async fn open_lightbox(page: &dyn BrowserSession) -> CheckResult<()> {
    page.click("a.glightbox").await?;
    page.wait_for_timeout(LIGHTBOX_SETTLE).await?;
    expect::visible(page, ".glightbox-container").await
}

async fn lightbox_links_to_webp(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_lightbox(&ctx, page).await?);
    let href = page.get_attribute("a.glightbox", "href").await?;
    ensure!(
        href.as_deref().map(|h| h.ends_with(".webp")).unwrap_or(false),
        "Lightbox link should point at a .webp image (href={:?})",
        href
    );
    Ok(Outcome::Passed)
}

async fn lightbox_opens_on_click(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_lightbox(&ctx, page).await?);
    open_lightbox(page).await?;
    Ok(Outcome::Passed)
}

async fn lightbox_closes_on_button(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_lightbox(&ctx, page).await?);
    open_lightbox(page).await?;
    page.click(".gclose").await?;
    page.wait_for_timeout(LIGHTBOX_SETTLE).await?;
    expect::hidden(page, ".glightbox-container").await?;
    Ok(Outcome::Passed)
}

async fn lightbox_closes_on_escape(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    or_skip!(open_post_with_lightbox(&ctx, page).await?);
    open_lightbox(page).await?;
    page.press(None, "Escape").await?;
    page.wait_for_timeout(LIGHTBOX_SETTLE).await?;
    expect::hidden(page, ".glightbox-container").await?;
    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blog_cases_registered() {
        let cases = cases();
        assert_eq!(cases.len(), 13);
        assert!(cases.iter().all(|c| c.suite == "blog" && c.param.is_none()));
    }
}
