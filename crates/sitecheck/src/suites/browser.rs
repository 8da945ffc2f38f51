//! Page load, injected chrome, scrolling, navigation and link behavior

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::expect;
use super::{browser_case, Case, CaseKind, Outcome, SessionContext};
use crate::ensure;
use crate::error::CheckResult;
use crate::or_skip;
use crate::session::BrowserSession;
use crate::viewport::{Viewport, ViewportClass};

const SUITE: &str = "browser";

/// Smooth-scroll animation time
pub(crate) const SCROLL_SETTLE: Duration = Duration::from_millis(1500);

/// Upper bound for click-triggered navigations
pub(crate) const NAV_TIMEOUT: Duration = Duration::from_secs(10);

const MOBILE_PANEL_SETTLE: Duration = Duration::from_millis(300);

/// Swallow clicks on the nav Blog link so the page stays put
const CANCEL_BLOG_NAVIGATION: &str = r##"(() => {
    const link = document.querySelector("#nav a[href*='blog']");
    if (link) {
        link.addEventListener('click', (e) => {
            e.preventDefault();
            window.clickedBlogLink = true;
        });
    }
})()"##;

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
        // Page load
        case("homepage_loads", homepage_loads),
        case("is_preload_class_removed", is_preload_class_removed),
        case("blog_index_loads", blog_index_loads),
        case("blog_post_loads", blog_post_loads),
        // Header/footer injection
        case("nav_logo_renders", nav_logo_renders),
        case("footer_social_links_render", footer_social_links_render),
        case("navigation_links_render", navigation_links_render),
        // Smooth scrolling
        case("scroll_to_about_section", scroll_to_about_section),
        case("services_link_navigates_to_page", services_link_navigates_to_page),
        case("scroll_to_contact_section", scroll_to_contact_section),
        case("hero_lets_talk_button_scrolls", hero_lets_talk_button_scrolls),
        // Navigation
        case("navigate_to_blog", navigate_to_blog),
        case("blog_navigate_to_about", blog_navigate_to_about),
        case("blog_post_back_to_blog", blog_post_back_to_blog),
        case("blog_cross_page_anchor_links", blog_cross_page_anchor_links),
        case("logo_from_blog_index_navigates_home", logo_from_blog_index_navigates_home),
        case("logo_from_blog_page_2_navigates_home", logo_from_blog_page_2_navigates_home),
        // External links
        case("linkedin_opens_new_tab", linkedin_opens_new_tab),
        case("github_opens_new_tab", github_opens_new_tab),
        case("email_link_has_mailto", email_link_has_mailto),
        // Active nav state, desktop
        case("about_nav_current_when_scrolled", about_nav_current_when_scrolled),
        case("contact_nav_current_when_scrolled", contact_nav_current_when_scrolled),
        case("services_nav_current_on_services_page", services_nav_current_on_services_page),
        case("blog_nav_current_on_blog_page", blog_nav_current_on_blog_page),
        case("blog_nav_current_on_blog_post", blog_nav_current_on_blog_post),
        // Active nav state, mobile
        case("mobile_about_link_current_when_scrolled", mobile_about_link_current),
        case("mobile_current_state_updates_on_scroll", mobile_current_state_updates),
        case("mobile_services_link_current", mobile_services_link_current),
        case("mobile_blog_link_current", mobile_blog_link_current),
        // Keyboard
        case("escape_key_behavior", escape_key_behavior),
        case("tab_navigation", tab_navigation),
        // Transitions
        case("navigating_away_class_added", navigating_away_class_added),
        case("navigating_away_not_added_for_anchors", navigating_away_not_added_for_anchors),
        // Contact section
        case("contact_email_link_correct", contact_email_link_correct),
        case("contact_phone_link_correct", contact_phone_link_correct),
        case("lets_talk_button_is_email_link", lets_talk_button_is_email_link),
    ]
}

async fn homepage_loads(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    page.goto(&ctx.url("/index.html")).await?;
    expect::title(page.as_ref(), "MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn is_preload_class_removed(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    ensure!(
        !page.has_class("body", "is-preload").await?,
        "body still has is-preload after load"
    );
    Ok(Outcome::Passed)
}

async fn blog_index_loads(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    page.goto(&ctx.url("/blog/index.html")).await?;
    expect::title(page.as_ref(), "Blog - MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn blog_post_loads(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    page.goto(&ctx.url(&post)).await?;
    expect::visible(page.as_ref(), "article").await?;
    Ok(Outcome::Passed)
}

async fn nav_logo_renders(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    expect::visible(page.as_ref(), "#nav .nav-logo img").await?;
    Ok(Outcome::Passed)
}

async fn footer_social_links_render(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    expect::visible(page.as_ref(), "#footer").await?;
    expect::visible(page.as_ref(), "#footer a[href*='linkedin']").await?;
    Ok(Outcome::Passed)
}

async fn navigation_links_render(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    expect::visible(page.as_ref(), "#nav").await?;
    expect::visible(page.as_ref(), "#nav a[href='#about']").await?;
    Ok(Outcome::Passed)
}

async fn scroll_to_about_section(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;

    let before = expect::scroll_y(page).await?;
    page.click("#nav a[href='#about']").await?;
    page.wait_for_timeout(SCROLL_SETTLE).await?;
    let after = expect::scroll_y(page).await?;

    ensure!(
        after > before,
        "Page did not scroll to about section (scrollY {} -> {})",
        before,
        after
    );
    expect::in_viewport(page, "#about").await?;
    Ok(Outcome::Passed)
}

async fn services_link_navigates_to_page(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.click("#nav a[href='services/']").await?;
    page.wait_for_url("**/services/**", NAV_TIMEOUT).await?;
    expect::title(page, "Services - MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn scroll_to_contact_section(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.click("#nav a[href='#contact']").await?;
    page.wait_for_timeout(SCROLL_SETTLE).await?;
    expect::in_viewport(page, "#contact").await?;
    Ok(Outcome::Passed)
}

async fn hero_lets_talk_button_scrolls(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.click("#hero a.scrolly[href='#contact']").await?;
    page.wait_for_timeout(SCROLL_SETTLE).await?;
    expect::in_viewport(page, "#contact").await?;
    Ok(Outcome::Passed)
}

async fn navigate_to_blog(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.click("#nav a[href='blog/index.html']").await?;
    page.wait_for_url("**/blog/**", NAV_TIMEOUT).await?;
    expect::title(page, "Blog - MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn blog_navigate_to_about(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/index.html").await?;
    page.click("#nav a[href='../index.html#about']").await?;
    page.wait_for_url("**/index.html**", NAV_TIMEOUT).await?;
    expect::title(page, "MB Secure").await?;
    Ok(Outcome::Passed)
}

async fn blog_post_back_to_blog(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    let page = page.as_ref();
    ctx.open(page, &post).await?;
    page.click("#nav a[href='../../index.html']").await?;
    page.wait_for_url("**/blog/index.html", NAV_TIMEOUT).await?;
    Ok(Outcome::Passed)
}

async fn blog_cross_page_anchor_links(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/blog/index.html").await?;

    let selector = "a[href='../index.html#contact']";
    if page.count(selector).await? == 0 {
        return Ok(Outcome::Skipped("Blog index has no link to the contact section".to_string()));
    }
    page.click(selector).await?;
    page.wait_for_timeout(SCROLL_SETTLE).await?;
    expect::url_matches(page, r".*/index\.html.*").await?;
    Ok(Outcome::Passed)
}

async fn logo_navigates_home(ctx: Ctx, page: Page, from: &str) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, from).await?;
    page.click("#nav .nav-logo").await?;
    page.wait_for_timeout(ctx.config.browser.settle()).await?;
    expect::url_matches(page, r"/(index\.html)?$").await?;
    Ok(Outcome::Passed)
}

async fn logo_from_blog_index_navigates_home(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    logo_navigates_home(ctx, page, "/blog/index.html").await
}

async fn logo_from_blog_page_2_navigates_home(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    logo_navigates_home(ctx, page, "/blog/page/2/index.html").await
}

async fn opens_new_tab(ctx: Ctx, page: Page, selector: &str, label: &str) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    let target = page.get_attribute(selector, "target").await?;
    ensure!(
        target.as_deref() == Some("_blank"),
        "{} link should open in new tab (target={:?})",
        label,
        target
    );
    Ok(Outcome::Passed)
}

async fn linkedin_opens_new_tab(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    opens_new_tab(ctx, page, "a[href*='linkedin']", "LinkedIn").await
}

async fn github_opens_new_tab(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    opens_new_tab(ctx, page, "a[href*='github']", "GitHub").await
}

async fn email_link_has_mailto(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    ctx.open(page.as_ref(), "/index.html").await?;
    let href = page.get_attribute("a[href^='mailto:']", "href").await?;
    ensure!(
        href.as_deref().map(|h| h.contains("mailto:")).unwrap_or(false),
        "Email link should use mailto protocol (href={:?})",
        href
    );
    Ok(Outcome::Passed)
}

/// Desktop: the `current` class sits on the parent `<li>`
async fn desktop_nav_current(
    ctx: Ctx,
    page: Page,
    target: &str,
    scroll_to: Option<&str>,
    current: &str,
    not_current: Option<&str>,
) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, Viewport::DESKTOP, target).await?;

    if let Some(section) = scroll_to {
        page.evaluate(&format!("document.querySelector('{}').scrollIntoView()", section))
            .await?;
        page.wait_for_timeout(ctx.config.browser.settle()).await?;
    }

    expect::class_contains(page, current, "current", true).await?;
    if let Some(other) = not_current {
        expect::class_contains(page, other, "current", false).await?;
    }
    Ok(Outcome::Passed)
}

async fn about_nav_current_when_scrolled(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    desktop_nav_current(
        ctx,
        page,
        "/index.html",
        Some("#about"),
        "#nav li:has(a[href='#about'])",
        None,
    )
    .await
}

async fn contact_nav_current_when_scrolled(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    desktop_nav_current(
        ctx,
        page,
        "/index.html",
        Some("#contact"),
        "#nav li:has(a[href='#contact'])",
        Some("#nav li:has(a[href='#about'])"),
    )
    .await
}

async fn services_nav_current_on_services_page(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    desktop_nav_current(
        ctx,
        page,
        "/services/index.html",
        None,
        "#nav li:has(a[href*='services'])",
        None,
    )
    .await
}

async fn blog_nav_current_on_blog_page(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    desktop_nav_current(
        ctx,
        page,
        "/blog/index.html",
        None,
        "#nav li:has(a[href*='blog'])",
        None,
    )
    .await
}

async fn blog_nav_current_on_blog_post(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let post = or_skip!(ctx.sample_post());
    // Post links are relative (../../index.html), so match the label
    desktop_nav_current(
        ctx,
        page,
        &post,
        None,
        "#nav li:has(a:has-text('Blog'))",
        None,
    )
    .await
}

/// Mobile: the `current` class sits on the panel link itself
async fn mobile_nav_current(
    ctx: Ctx,
    page: Page,
    target: &str,
    scroll_to: Option<&str>,
    current: &str,
    not_current: Option<&str>,
) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open_at(page, ViewportClass::Mobile.viewport(), target)
        .await?;

    page.click("#titleBar .toggle").await?;
    page.wait_for_timeout(MOBILE_PANEL_SETTLE).await?;

    if let Some(section) = scroll_to {
        page.evaluate(&format!("document.querySelector('{}').scrollIntoView()", section))
            .await?;
        page.wait_for_timeout(Duration::from_millis(200)).await?;
    }

    expect::class_contains(page, current, "current", true).await?;
    if let Some(other) = not_current {
        expect::class_contains(page, other, "current", false).await?;
    }
    Ok(Outcome::Passed)
}

async fn mobile_about_link_current(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    mobile_nav_current(
        ctx,
        page,
        "/index.html",
        Some("#about"),
        "#navPanel .link[href='#about']",
        None,
    )
    .await
}

async fn mobile_current_state_updates(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    mobile_nav_current(
        ctx,
        page,
        "/index.html",
        Some("#contact"),
        "#navPanel .link[href='#contact']",
        Some("#navPanel .link[href='#about']"),
    )
    .await
}

async fn mobile_services_link_current(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    mobile_nav_current(
        ctx,
        page,
        "/services/index.html",
        None,
        "#navPanel .link[href*='services']",
        None,
    )
    .await
}

async fn mobile_blog_link_current(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    mobile_nav_current(
        ctx,
        page,
        "/blog/index.html",
        None,
        "#navPanel .link[href*='blog']",
        None,
    )
    .await
}

async fn escape_key_behavior(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.press(None, "Escape").await?;
    page.wait_for_timeout(Duration::from_millis(200)).await?;
    expect::visible(page, "body").await?;
    Ok(Outcome::Passed)
}

async fn tab_navigation(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    for _ in 0..3 {
        page.press(None, "Tab").await?;
        page.wait_for_timeout(Duration::from_millis(100)).await?;
    }
    let focused = page.evaluate("document.activeElement && document.activeElement.tagName").await?;
    ensure!(!focused.is_null(), "No element has focus after tabbing");
    Ok(Outcome::Passed)
}

async fn navigating_away_class_added(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;

    // Cancel the navigation so the transition class can be observed
    page.evaluate(CANCEL_BLOG_NAVIGATION).await?;

    page.click("#nav a[href*='blog']").await?;
    page.wait_for_timeout(Duration::from_millis(100)).await?;
    expect::class_contains(page, "body", "navigating-away", true).await?;
    Ok(Outcome::Passed)
}

async fn navigating_away_not_added_for_anchors(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    page.click("#nav a[href='#about']").await?;
    page.wait_for_timeout(Duration::from_millis(100)).await?;
    expect::class_contains(page, "body", "navigating-away", false).await?;
    Ok(Outcome::Passed)
}

async fn contact_email_link_correct(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    let selector = "#contact a[href^='mailto:']";
    expect::visible(page, selector).await?;
    expect::attribute_matches(page, selector, "href", r"mailto:.*@mbsecure\.nl").await?;
    Ok(Outcome::Passed)
}

async fn contact_phone_link_correct(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    let selector = "#contact a[href^='tel:']";
    expect::visible(page, selector).await?;
    expect::attribute_matches(page, selector, "href", r"tel:\+31").await?;
    Ok(Outcome::Passed)
}

async fn lets_talk_button_is_email_link(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    ctx.open(page, "/index.html").await?;
    let selector = "#contact .button:has-text('Talk')";
    expect::visible(page, selector).await?;
    expect::attribute_matches(page, selector, "href", "mailto:").await?;
    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_names_are_unique() {
        let cases = cases();
        let ids: HashSet<String> = cases.iter().map(|c| c.id(None)).collect();
        assert_eq!(ids.len(), cases.len());
        assert!(cases.iter().all(|c| c.kind == CaseKind::Browser));
    }

    #[test]
    fn test_cancel_script_keeps_selector_quotes() {
        assert!(CANCEL_BLOG_NAVIGATION.starts_with("(() => {"));
        assert!(CANCEL_BLOG_NAVIGATION.contains(r##"querySelector("#nav a[href*='blog']")"##));
        assert!(CANCEL_BLOG_NAVIGATION.ends_with("})()"));
    }
}
