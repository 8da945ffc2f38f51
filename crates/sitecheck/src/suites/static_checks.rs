//! HTTP-only checks: page responses, markup shell, meta tags, links and assets

use std::future::Future;
use std::sync::Arc;

use super::{http_case, Case, CaseKind, Outcome, SessionContext};
use crate::config::HarnessConfig;
use crate::discovery::TargetDiscovery;
use crate::error::CheckResult;
use crate::reachability::{MetaTag, Reference};

const SUITE: &str = "static";

/// A static case parametrized by one path or URL
fn param_case<F, Fut>(name: &str, param: &str, check: F) -> Case
where
    F: Fn(Arc<SessionContext>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult<()>> + Send + 'static,
{
    let param = param.to_string();
    http_case(SUITE, name, Some(param.clone()), CaseKind::Static, move |ctx| {
        let check = check(ctx, param.clone());
        async move { check.await.map(|_| Outcome::Passed) }
    })
}

fn single_case<F, Fut>(name: &str, check: F) -> Case
where
    F: Fn(Arc<SessionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult<()>> + Send + 'static,
{
    http_case(SUITE, name, None, CaseKind::Static, move |ctx| {
        let check = check(ctx);
        async move { check.await.map(|_| Outcome::Passed) }
    })
}

pub fn cases(config: &HarnessConfig, discovery: &TargetDiscovery) -> Vec<Case> {
    let mut cases = Vec::new();

    for page in discovery.pages() {
        cases.push(param_case("page_returns_200", &page, |ctx, page| async move {
            ctx.links.check_status(&page).await
        }));
        cases.push(param_case("page_has_content", &page, |ctx, page| async move {
            ctx.links.check_content(&page).await
        }));
        cases.push(param_case("page_has_valid_html", &page, |ctx, page| async move {
            ctx.links.check_document_shell(&page).await
        }));
        cases.push(param_case("internal_links_resolve", &page, |ctx, page| async move {
            ctx.links.check_internal_links(&page).await
        }));
        for tag in MetaTag::all() {
            let name = format!("page_has_{}_meta", tag.as_str());
            cases.push(param_case(&name, &page, move |ctx, page| async move {
                ctx.links.check_meta(&page, tag).await
            }));
        }
    }

    for resource in &config.external_resources {
        cases.push(param_case("external_resource_accessible", resource, |ctx, url| async move {
            ctx.links.check_external(&url).await
        }));
    }

    for image in &config.images {
        cases.push(param_case("image_exists", image, |ctx, image| async move {
            ctx.links.check_asset(&image, 0).await
        }));
    }
    cases.push(single_case("images_referenced_in_pages", |ctx| async move {
        ctx.links.check_references("/index.html", Reference::Images).await
    }));

    cases.push(single_case("main_css_loads", |ctx| async move {
        ctx.links.check_asset("/assets/css/main.css", 100).await
    }));
    cases.push(single_case("fontawesome_css_loads", |ctx| async move {
        ctx.links.check_asset("/assets/css/fontawesome-all.min.css", 0).await
    }));
    cases.push(single_case("main_js_loads", |ctx| async move {
        ctx.links.check_asset("/assets/js/main.js", 0).await
    }));
    cases.push(single_case("all_js_files_load", |ctx| async move {
        ctx.links.check_references("/index.html", Reference::Scripts).await
    }));

    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cases_cover_every_page_and_resource() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            site_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let discovery = TargetDiscovery::new(&config);
        let cases = cases(&config, &discovery);

        // 4 fixed pages x 7 checks, 3 external, 2 images, 5 single
        assert_eq!(cases.len(), 4 * 7 + 3 + 2 + 5);
        assert!(cases.iter().all(|c| c.kind == CaseKind::Static));

        let ids: Vec<String> = cases.iter().map(|c| c.id(None)).collect();
        assert!(ids.contains(&"static::page_returns_200[/index.html]".to_string()));
        assert!(ids.contains(&"static::page_has_charset_meta[/blog/page/2/index.html]".to_string()));
        assert!(ids.contains(&"static::main_css_loads".to_string()));
    }
}
