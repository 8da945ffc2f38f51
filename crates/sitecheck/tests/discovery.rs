//! Target discovery over a scratch site tree

mod common;

use sitecheck::discovery::{snapshot_name, TargetDiscovery};
use sitecheck::ViewportClass;

#[test]
fn test_pages_are_fixed_then_sorted_posts() {
    let site = common::site();
    let discovery = TargetDiscovery::new(&common::config(site.path()));

    assert_eq!(
        discovery.pages(),
        vec![
            "/index.html",
            "/services/index.html",
            "/blog/index.html",
            "/blog/page/2/index.html",
            "/blog/2020/4/the-sources-for-hunts-and-how-to-prioritise.html",
            "/blog/2021/3/first-post.html",
        ]
    );
}

#[test]
fn test_discovery_is_computed_once_per_session() {
    let site = common::site();
    let discovery = TargetDiscovery::new(&common::config(site.path()));
    let first = discovery.content_pages().to_vec();

    // Files added after the first scan do not change this session's targets
    common::write(site.path(), "blog/2022/1/late.html", "<html></html>");
    assert_eq!(discovery.content_pages(), first.as_slice());

    // A fresh session sees them, in sorted position
    let next = TargetDiscovery::new(&common::config(site.path()));
    assert_eq!(next.content_pages().len(), first.len() + 1);
    assert_eq!(next.content_pages()[2], "/blog/2022/1/late.html");
}

#[test]
fn test_sample_post_prefers_configured_post() {
    let site = common::site();
    let discovery = TargetDiscovery::new(&common::config(site.path()));
    assert_eq!(
        discovery.sample_content_page(),
        Some("/blog/2020/4/the-sources-for-hunts-and-how-to-prioritise.html")
    );

    let mut config = common::config(site.path());
    config.preferred_post = "/blog/gone.html".to_string();
    let fallback = TargetDiscovery::new(&config);
    assert_eq!(fallback.sample_content_page(), Some("/blog/2020/4/the-sources-for-hunts-and-how-to-prioritise.html"));
}

#[test]
fn test_missing_content_root_yields_no_posts() {
    let dir = tempfile::tempdir().unwrap();
    let discovery = TargetDiscovery::new(&common::config(dir.path()));
    assert!(discovery.content_pages().is_empty());
    assert_eq!(discovery.sample_content_page(), None);
    assert_eq!(discovery.pages().len(), 4);
}

#[test]
fn test_every_post_maps_to_distinct_baselines() {
    let site = common::site();
    let discovery = TargetDiscovery::new(&common::config(site.path()));

    let mut names: Vec<String> = discovery
        .content_pages()
        .iter()
        .flat_map(|p| ViewportClass::all().map(|c| snapshot_name(p, c)))
        .collect();
    assert!(names.contains(&"blog-2021-3-first-post-mobile.png".to_string()));

    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total);
}
