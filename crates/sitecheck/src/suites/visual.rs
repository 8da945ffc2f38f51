//! Screenshot baselines for full pages and page components

use std::sync::Arc;
use std::time::Duration;

use super::{browser_case, Case, CaseKind, Outcome, SessionContext};
use crate::discovery::{snapshot_name, TargetDiscovery};
use crate::error::CheckResult;
use crate::or_skip;
use crate::session::BrowserSession;
use crate::viewport::ViewportClass;
use crate::visual::{Capturable, ElementSurface, PageSurface, SnapshotOutcome};

const SUITE: &str = "visual";

/// Web fonts and injected chrome settle
const LOAD_SETTLE: Duration = Duration::from_millis(1000);
const PRELOAD_SETTLE: Duration = Duration::from_millis(500);
const HOVER_SETTLE: Duration = Duration::from_millis(300);

const REMOVE_PRELOAD: &str = "document.body.classList.remove('is-preload')";

type Page = Arc<dyn BrowserSession>;
type Ctx = Arc<SessionContext>;

/// Page a component is captured on
#[derive(Debug, Clone, Copy)]
enum On {
    Path(&'static str),
    SamplePost,
}

/// Interaction before a component capture
#[derive(Debug, Clone, Copy)]
enum Before {
    Nothing,
    ScrollIntoView,
    OpenNavPanel,
    Hover(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Component {
    name: &'static str,
    class: ViewportClass,
    on: On,
    selector: &'static str,
    before: Before,
    /// Skip instead of failing when the element is absent
    optional: bool,
}

const fn component(
    name: &'static str,
    class: ViewportClass,
    on: On,
    selector: &'static str,
    before: Before,
) -> Component {
    Component {
        name,
        class,
        on,
        selector,
        before,
        optional: false,
    }
}

const COMPONENTS: [Component; 11] = [
    component("component-nav", ViewportClass::Desktop, On::Path("/index.html"), "#nav", Before::Nothing),
    component("component-hero", ViewportClass::Desktop, On::Path("/index.html"), "#hero", Before::Nothing),
    component("component-about", ViewportClass::Desktop, On::Path("/index.html"), "#about", Before::ScrollIntoView),
    component("component-services-page", ViewportClass::Desktop, On::Path("/services/index.html"), "#services", Before::Nothing),
    component("component-contact", ViewportClass::Desktop, On::Path("/index.html"), "#contact", Before::ScrollIntoView),
    component("component-footer", ViewportClass::Desktop, On::Path("/index.html"), "#footer", Before::ScrollIntoView),
    component("component-mobile-titlebar", ViewportClass::Mobile, On::Path("/index.html"), "#titleBar", Before::Nothing),
    component("component-mobile-nav-panel", ViewportClass::Mobile, On::Path("/index.html"), "#navPanel", Before::OpenNavPanel),
    Component {
        optional: true,
        ..component("component-blog-card", ViewportClass::Desktop, On::Path("/blog/index.html"), ".blog-card", Before::Nothing)
    },
    component("component-blog-article", ViewportClass::Desktop, On::SamplePost, "article", Before::Nothing),
    component("component-nav-hover", ViewportClass::Desktop, On::Path("/index.html"), "#nav", Before::Hover("#nav a[href='#about']")),
];

pub fn cases(discovery: &TargetDiscovery) -> Vec<Case> {
    let mut cases = Vec::new();

    for (target, stem) in [("/index.html", "homepage"), ("/blog/index.html", "blog-index")] {
        for class in ViewportClass::all() {
            let name = format!("{}-{}.png", stem, class.as_str());
            cases.push(full_page_case(stem, target.to_string(), class, name));
        }
    }

    for post in discovery.content_pages() {
        for class in ViewportClass::all() {
            let name = snapshot_name(post, class);
            cases.push(full_page_case("post", post.clone(), class, name));
        }
    }

    for component in COMPONENTS {
        cases.push(browser_case(
            SUITE,
            component.name,
            None,
            CaseKind::Visual,
            move |ctx, page| component_case(ctx, page, component),
        ));
    }

    cases.push(browser_case(
        SUITE,
        "homepage-scrolled",
        None,
        CaseKind::Visual,
        homepage_scrolled,
    ));

    cases
}

fn full_page_case(label: &str, target: String, class: ViewportClass, name: String) -> Case {
    let param = name.trim_end_matches(".png").to_string();
    browser_case(
        SUITE,
        &format!("{}_full_page", label.replace('-', "_")),
        Some(param),
        CaseKind::Visual,
        move |ctx, page| {
            let target = target.clone();
            let name = name.clone();
            async move { full_page(ctx, page, target, class, name).await }
        },
    )
}

/// Resize, load, drop the preload class and let the layout settle
async fn prepare(
    ctx: &SessionContext,
    page: &dyn BrowserSession,
    class: ViewportClass,
    target: &str,
) -> CheckResult<()> {
    page.set_viewport(class.viewport()).await?;
    page.goto(&ctx.url(target)).await?;
    page.wait_for_timeout(LOAD_SETTLE).await?;
    page.evaluate(REMOVE_PRELOAD).await?;
    page.wait_for_timeout(PRELOAD_SETTLE).await
}

async fn snapshot(
    ctx: &SessionContext,
    surface: &dyn Capturable,
    name: &str,
    full_page: bool,
) -> CheckResult<Outcome> {
    match ctx
        .snapshots
        .assert_screenshot(surface, name, full_page, None)
        .await?
    {
        SnapshotOutcome::Matched(_) | SnapshotOutcome::BaselineUpdated(_) => Ok(Outcome::Passed),
        SnapshotOutcome::BaselineCreated(_) => Ok(Outcome::Skipped(format!(
            "Baseline created: {}. Run again to compare.",
            name
        ))),
    }
}

async fn full_page(
    ctx: Ctx,
    page: Page,
    target: String,
    class: ViewportClass,
    name: String,
) -> CheckResult<Outcome> {
    let page = page.as_ref();
    prepare(&ctx, page, class, &target).await?;
    snapshot(&ctx, &PageSurface::new(page), &name, true).await
}

async fn component_case(ctx: Ctx, page: Page, component: Component) -> CheckResult<Outcome> {
    let page = page.as_ref();
    let target = match component.on {
        On::Path(path) => path.to_string(),
        On::SamplePost => or_skip!(ctx.sample_post()),
    };
    prepare(&ctx, page, component.class, &target).await?;

    if component.optional && page.count(component.selector).await? == 0 {
        return Ok(Outcome::Skipped(format!(
            "No {} element on {}",
            component.selector, target
        )));
    }

    match component.before {
        Before::Nothing => {}
        Before::ScrollIntoView => {
            page.evaluate(&format!(
                "document.querySelector('{}').scrollIntoView()",
                component.selector
            ))
            .await?;
            page.wait_for_timeout(PRELOAD_SETTLE).await?;
        }
        Before::OpenNavPanel => {
            page.click("#titleBar .toggle").await?;
            page.wait_for_timeout(PRELOAD_SETTLE).await?;
        }
        Before::Hover(selector) => {
            page.hover(selector).await?;
            page.wait_for_timeout(HOVER_SETTLE).await?;
        }
    }

    let name = format!("{}.png", component.name);
    snapshot(
        &ctx,
        &ElementSurface::new(page, component.selector),
        &name,
        false,
    )
    .await
}

async fn homepage_scrolled(ctx: Ctx, page: Page) -> CheckResult<Outcome> {
    let page = page.as_ref();
    prepare(&ctx, page, ViewportClass::Desktop, "/index.html").await?;
    page.evaluate("window.scrollTo(0, 500)").await?;
    page.wait_for_timeout(PRELOAD_SETTLE).await?;
    snapshot(&ctx, &PageSurface::new(page), "homepage-scrolled.png", false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;

    #[test]
    fn test_every_post_gets_a_baseline_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let post_dir = dir.path().join("blog/2021/3");
        std::fs::create_dir_all(&post_dir).unwrap();
        std::fs::write(post_dir.join("a-post.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "<html></html>").unwrap();

        let config = HarnessConfig {
            site_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let discovery = TargetDiscovery::new(&config);
        let cases = cases(&discovery);

        // 4 fixed full pages, 2 per post, components, scrolled
        assert_eq!(cases.len(), 4 + 2 + COMPONENTS.len() + 1);
        assert!(cases.iter().all(|c| c.kind == CaseKind::Visual));

        let ids: Vec<String> = cases.iter().map(|c| c.id(None)).collect();
        assert!(ids.contains(&"visual::post_full_page[blog-2021-3-a-post-desktop]".to_string()));
        assert!(ids.contains(&"visual::post_full_page[blog-2021-3-a-post-mobile]".to_string()));
        assert!(ids.contains(&"visual::homepage_full_page[homepage-desktop]".to_string()));
        assert!(ids.contains(&"visual::component-nav-hover".to_string()));
    }

    #[test]
    fn test_component_names_are_unique() {
        let mut names: Vec<&str> = COMPONENTS.iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), COMPONENTS.len());
    }
}
