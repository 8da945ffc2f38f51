//! Layout at each breakpoint and the mobile navigation panel

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::browser::SCROLL_SETTLE;
use super::expect;
use super::{browser_case, Case, CaseKind, Outcome, SessionContext};
use crate::ensure;
use crate::error::CheckResult;
use crate::or_skip;
use crate::session::BrowserSession;
use crate::viewport::Viewport;

const SUITE: &str = "responsive";

const PANEL_SETTLE: Duration = Duration::from_millis(500);
const RESIZE_SETTLE: Duration = Duration::from_millis(500);

const HORIZONTAL_OVERFLOW: &str =
    "document.documentElement.scrollWidth > document.documentElement.clientWidth";

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
    let mut cases = vec![
        case("desktop_shows_nav_bar", desktop_shows_nav_bar),
        case("desktop_services_section_layout", desktop_services_section_layout),
        case("mobile_shows_title_bar", mobile_shows_title_bar),
        case("mobile_nav_toggle_exists", mobile_nav_toggle_exists),
        case("mobile_nav_panel_opens", mobile_nav_panel_opens),
        case("mobile_nav_panel_closes", mobile_nav_panel_closes),
        case("mobile_nav_panel_stays_open_on_escape", mobile_nav_panel_escape),
        case("mobile_nav_link_scrolls_to_section", mobile_nav_link_scrolls),
        case("tablet_landscape_shows_nav", tablet_landscape_shows_nav),
        case("tablet_shows_title_bar", tablet_shows_title_bar),
        case("mobile_small_has_no_horizontal_scroll", mobile_small_no_horizontal_scroll),
        case("blog_post_fits_mobile_width", blog_post_fits_mobile_width),
        case("banner_button_fits_mobile", banner_button_fits_mobile),
        case("resize_desktop_to_mobile", resize_desktop_to_mobile),
        case("resize_mobile_to_desktop", resize_mobile_to_desktop),
    ];

    for (name, viewport) in Viewport::catalog() {
        cases.push(browser_case(
            SUITE,
            "homepage_renders_at_breakpoint",
            Some(name.to_string()),
            CaseKind::Browser,
            move |ctx, page| homepage_renders_at(ctx, page, viewport),
        ));
    }

    cases
}

async fn homepage_renders_at(ctx: Ctx, page: Page, viewport: Viewport) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, viewport, "/index.html").await?;
    expect::visible(page, "#footer").await?;

    // One of the two navigation surfaces is always on screen
    let nav = page.is_visible("#nav").await?;
    let title_bar = page.is_visible("#titleBar").await?;
    ensure!(
        nav || title_bar,
        "Neither #nav nor #titleBar is visible at {}",
        viewport
    );
    Ok(Outcome::Passed)
}

async fn desktop_shows_nav_bar(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::DESKTOP, "/index.html").await?;
    expect::visible(page, "#nav").await?;
    expect::hidden(page, "#titleBar").await?;
    Ok(Outcome::Passed)
}

async fn desktop_services_section_layout(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::DESKTOP, "/services/index.html")
        .await?;
    expect::visible(page, "#services").await?;

    let width = page
        .bounding_box("#services")
        .await?
        .map(|b| b.width)
        .unwrap_or(0.0);
    ensure!(width > 700.0, "Services section too narrow on desktop: {}px", width);
    Ok(Outcome::Passed)
}

async fn mobile_shows_title_bar(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE, "/index.html").await?;
    expect::hidden(page, "#nav").await?;
    expect::visible(page, "#titleBar").await?;
    Ok(Outcome::Passed)
}

async fn mobile_nav_toggle_exists(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE, "/index.html").await?;
    expect::visible(page, "#titleBar .toggle").await?;
    Ok(Outcome::Passed)
}

/// Mobile homepage with the nav panel toggled open
async fn open_panel(ctx: &SessionContext, page: &dyn BrowserSession) -> CheckResult<()> {
    ctx.open_at(page, Viewport::MOBILE, "/index.html").await?;
    page.click("#titleBar .toggle").await?;
    page.wait_for_timeout(PANEL_SETTLE).await?;
    expect::visible(page, "#navPanel").await?;
    expect::class_contains(page, "body", "navPanel-visible", true).await
}

async fn mobile_nav_panel_opens(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    open_panel(&ctx, page.as_ref()).await?;
    Ok(Outcome::Passed)
}

async fn mobile_nav_panel_closes(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    open_panel(&ctx, page).await?;
    page.click("#titleBar .toggle").await?;
    page.wait_for_timeout(PANEL_SETTLE).await?;
    expect::class_contains(page, "body", "navPanel-visible", false).await?;
    Ok(Outcome::Passed)
}

/// Escape does not dismiss the panel on this site; this pins that behavior
async fn mobile_nav_panel_escape(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    open_panel(&ctx, page).await?;
    page.press(None, "Escape").await?;
    page.wait_for_timeout(PANEL_SETTLE).await?;
    expect::class_contains(page, "body", "navPanel-visible", true).await?;
    Ok(Outcome::Passed)
}

async fn mobile_nav_link_scrolls(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    open_panel(&ctx, page).await?;
    page.click("#navPanel a[href='#about']").await?;
    page.wait_for_timeout(SCROLL_SETTLE).await?;
    expect::in_viewport(page, "#about").await?;
    Ok(Outcome::Passed)
}

async fn tablet_landscape_shows_nav(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::TABLET_LANDSCAPE, "/index.html")
        .await?;
    expect::visible(page, "#nav").await?;
    Ok(Outcome::Passed)
}

async fn tablet_shows_title_bar(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::TABLET, "/index.html").await?;
    expect::visible(page, "#titleBar").await?;
    Ok(Outcome::Passed)
}

async fn mobile_small_no_horizontal_scroll(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE_SMALL, "/index.html").await?;
    let overflow = page.evaluate(HORIZONTAL_OVERFLOW).await?;
    ensure!(
        overflow.as_bool() == Some(false),
        "Page scrolls horizontally at {}",
        Viewport::MOBILE_SMALL
    );
    Ok(Outcome::Passed)
}

async fn blog_post_fits_mobile_width(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE, &post).await?;
    expect::visible(page, "article").await?;

    let width = page
        .bounding_box("article")
        .await?
        .map(|b| b.width)
        .unwrap_or(0.0);
    ensure!(
        width <= Viewport::MOBILE.width as f64,
        "Article is {}px wide, wider than the {}px viewport",
        width,
        Viewport::MOBILE.width
    );
    Ok(Outcome::Passed)
}

async fn banner_button_fits_mobile(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE, "/index.html").await?;

    let selector = "#banner a.button";
    if page.count(selector).await? == 0 {
        return Ok(Outcome::Skipped("Homepage has no banner button".to_string()));
    }
    let width = page
        .bounding_box(selector)
        .await?
        .map(|b| b.width)
        .unwrap_or(0.0);
    ensure!(width < 450.0, "Banner button is {}px wide on mobile", width);
    Ok(Outcome::Passed)
}

async fn resize_desktop_to_mobile(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::DESKTOP, "/index.html").await?;
    expect::visible(page, "#nav").await?;

    page.set_viewport(Viewport::MOBILE).await?;
    page.wait_for_timeout(RESIZE_SETTLE).await?;
    expect::hidden(page, "#nav").await?;
    expect::visible(page, "#titleBar").await?;
    Ok(Outcome::Passed)
}

async fn resize_mobile_to_desktop(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::MOBILE, "/index.html").await?;
    expect::visible(page, "#titleBar").await?;

    page.set_viewport(Viewport::DESKTOP).await?;
    page.wait_for_timeout(RESIZE_SETTLE).await?;
    expect::visible(page, "#nav").await?;
    expect::hidden(page, "#titleBar").await?;
    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_cases_are_parametrized() {
        let ids: Vec<String> = cases().iter().map(|c| c.id(None)).collect();
        for (name, _) in Viewport::catalog() {
            let id = format!("responsive::homepage_renders_at_breakpoint[{}]", name);
            assert!(ids.contains(&id), "missing {}", id);
        }
    }
}
