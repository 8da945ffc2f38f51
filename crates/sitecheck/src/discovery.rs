//! Test-target discovery
//!
//! Targets are absolute URL paths (`/blog/2020/4/post.html`). The fixed pages
//! come from configuration; content pages are found by walking the content
//! directory. Discovery output is sorted so parametrized case IDs stay stable
//! across runs on the same file set.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::HarnessConfig;
use crate::viewport::ViewportClass;

/// Enumerate content pages under `site_root/content_dir`.
///
/// Files named `index_file` are section indexes and are skipped. A missing
/// content directory yields an empty list.
pub fn discover_content_pages(
    site_root: &Path,
    content_dir: &Path,
    index_file: &str,
    extension: &str,
) -> Vec<String> {
    let root = site_root.join(content_dir);
    if !root.is_dir() {
        debug!("Content root {} does not exist; no content pages", root.display());
        return Vec::new();
    }

    let mut pages: Vec<String> = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == extension)
                .unwrap_or(false)
        })
        .filter(|e| e.file_name() != index_file)
        .filter_map(|e| url_path(site_root, e.path()))
        .collect();

    pages.sort();
    pages
}

/// Convert a file location to a `/`-prefixed path relative to the site root.
fn url_path(site_root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(site_root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(format!("/{}", segments.join("/")))
}

/// Session-scoped discovery service.
///
/// Built once per session and shared by handle; the content scan runs at
/// most once.
#[derive(Debug)]
pub struct TargetDiscovery {
    site_root: PathBuf,
    content_dir: PathBuf,
    index_file: String,
    extension: String,
    fixed_pages: Vec<String>,
    preferred_post: String,
    content_pages: OnceCell<Vec<String>>,
}

impl TargetDiscovery {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            site_root: config.site_root.clone(),
            content_dir: config.content_dir.clone(),
            index_file: config.index_file.clone(),
            extension: config.content_extension.clone(),
            fixed_pages: config.fixed_pages.clone(),
            preferred_post: config.preferred_post.clone(),
            content_pages: OnceCell::new(),
        }
    }

    /// Discovered content pages, computed on first use.
    pub fn content_pages(&self) -> &[String] {
        self.content_pages.get_or_init(|| {
            discover_content_pages(
                &self.site_root,
                &self.content_dir,
                &self.index_file,
                &self.extension,
            )
        })
    }

    pub fn fixed_pages(&self) -> &[String] {
        &self.fixed_pages
    }

    /// Fixed pages followed by every discovered content page.
    pub fn pages(&self) -> Vec<String> {
        self.fixed_pages
            .iter()
            .chain(self.content_pages().iter())
            .cloned()
            .collect()
    }

    /// Post used by checks that need a single representative article.
    pub fn sample_content_page(&self) -> Option<&str> {
        let pages = self.content_pages();
        pages
            .iter()
            .find(|p| **p == self.preferred_post)
            .or_else(|| pages.first())
            .map(String::as_str)
    }
}

/// `/blog/2020/4/post.html` -> `blog-2020-4-post`
pub fn snapshot_stem(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    let without_ext = match trimmed.rfind('.') {
        Some(dot) if !trimmed[dot..].contains('/') => &trimmed[..dot],
        _ => trimmed,
    };
    without_ext.replace('/', "-")
}

/// Baseline file name for a target captured at a viewport class.
pub fn snapshot_name(target: &str, class: ViewportClass) -> String {
    format!("{}-{}.png", snapshot_stem(target), class.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/blog/2020/4/the-sources-for-hunts.html", "blog-2020-4-the-sources-for-hunts" ; "nested post")]
    #[test_case("/index.html", "index" ; "root page")]
    #[test_case("/blog/page/2/index.html", "blog-page-2-index" ; "pagination")]
    #[test_case("/blog/v1.2/notes.html", "blog-v1.2-notes" ; "dot in directory")]
    #[test_case("/blog/archive", "blog-archive" ; "no extension")]
    fn test_snapshot_stem(target: &str, expected: &str) {
        assert_eq!(snapshot_stem(target), expected);
    }

    #[test]
    fn test_snapshot_name_carries_viewport_class() {
        let desktop = snapshot_name("/blog/a.html", ViewportClass::Desktop);
        let mobile = snapshot_name("/blog/a.html", ViewportClass::Mobile);
        assert_eq!(desktop, "blog-a-desktop.png");
        assert_eq!(mobile, "blog-a-mobile.png");
    }

    #[test]
    fn test_missing_content_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pages =
            discover_content_pages(dir.path(), Path::new("blog"), "index.html", "html");
        assert!(pages.is_empty());
    }
}
