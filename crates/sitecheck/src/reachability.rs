//! Static reachability checks over plain HTTP
//!
//! Pages are fetched with `reqwest` and their markup walked with `kuchiki`
//! selectors. Reference checks (links, images, scripts) collect every
//! failure on a page before reporting.

use std::collections::HashSet;
use std::time::Duration;

use kuchiki::traits::TendrilSink;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpSettings;
use crate::ensure;
use crate::error::{CheckError, CheckResult};

/// Statuses accepted from third-party sites; 999 is LinkedIn's bot wall.
pub const EXTERNAL_OK_STATUSES: [u16; 7] = [200, 301, 302, 303, 307, 308, 999];

/// Minimum body length for a page to count as having content
pub const MIN_PAGE_LENGTH: usize = 100;

static SHELL_TAGS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ["html", "head", "body", "title"]
        .into_iter()
        .filter_map(|tag| {
            Regex::new(&format!(r"(?i)<{}[\s>/]", tag))
                .ok()
                .map(|re| (tag, re))
        })
        .collect()
});

/// How an `href` found on a page is treated by the link check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    External,
    Mailto,
    Tel,
    /// Same-page anchor, including an empty href after the anchor is cut
    Anchor,
    /// Internal reference with any `#fragment` removed
    Internal(String),
}

pub fn classify_link(href: &str) -> LinkKind {
    if href.starts_with("http://") || href.starts_with("https://") {
        return LinkKind::External;
    }
    if href.starts_with("mailto:") {
        return LinkKind::Mailto;
    }
    if href.starts_with("tel:") {
        return LinkKind::Tel;
    }

    let path = href.split('#').next().unwrap_or_default();
    if path.is_empty() {
        LinkKind::Anchor
    } else {
        LinkKind::Internal(path.to_string())
    }
}

/// Local references a page can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Images,
    Scripts,
}

impl Reference {
    fn selector(&self) -> &'static str {
        match self {
            Reference::Images => "img[src]",
            Reference::Scripts => "script[src]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reference::Images => "images",
            Reference::Scripts => "scripts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTag {
    Description,
    Viewport,
    Charset,
}

impl MetaTag {
    fn selector(&self) -> &'static str {
        match self {
            MetaTag::Description => r#"meta[name="description"]"#,
            MetaTag::Viewport => r#"meta[name="viewport"]"#,
            MetaTag::Charset => "meta[charset]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaTag::Description => "description",
            MetaTag::Viewport => "viewport",
            MetaTag::Charset => "charset",
        }
    }

    pub fn all() -> [MetaTag; 3] {
        [MetaTag::Description, MetaTag::Viewport, MetaTag::Charset]
    }
}

/// Values of `attr` on every element matching `selector`
pub fn attribute_values(html: &str, selector: &str, attr: &str) -> Vec<String> {
    let document = kuchiki::parse_html().one(html);
    let Ok(matches) = document.select(selector) else {
        warn!("Invalid selector: {}", selector);
        return Vec::new();
    };
    matches
        .filter_map(|m| {
            let attributes = m.attributes.borrow();
            attributes.get(attr).map(String::from)
        })
        .collect()
}

pub fn has_element(html: &str, selector: &str) -> bool {
    let document = kuchiki::parse_html().one(html);
    document.select_first(selector).is_ok()
}

/// Shell tags absent from the raw source.
///
/// The HTML parser synthesizes missing `html`/`head`/`body`, so presence is
/// checked on the source text.
pub fn missing_shell_tags(source: &str) -> Vec<&'static str> {
    SHELL_TAGS
        .iter()
        .filter(|(_, re)| !re.is_match(source))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Whether a host blocks HEAD requests and needs a GET
pub fn requires_get(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default();
    ["linkedin.com", "github.com"]
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

#[derive(Debug)]
pub struct FetchedPage {
    pub url: Url,
    pub status: StatusCode,
    pub body: String,
}

/// HTTP checks against the local server and third-party resources
#[derive(Debug, Clone)]
pub struct LinkChecker {
    base_url: Url,
    client: Client,
    external: Client,
}

impl LinkChecker {
    pub fn new(base_url: &str, settings: &HttpSettings) -> CheckResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let external = Client::builder()
            .timeout(Duration::from_secs(settings.external_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            base_url: Url::parse(base_url)?,
            client,
            external,
        })
    }

    pub fn url_for(&self, target: &str) -> CheckResult<Url> {
        Ok(self.base_url.join(target)?)
    }

    pub async fn fetch(&self, target: &str) -> CheckResult<FetchedPage> {
        let url = self.url_for(target)?;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(FetchedPage { url, status, body })
    }

    pub async fn check_status(&self, target: &str) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        ensure!(
            page.status == StatusCode::OK,
            "Page {} returned {}",
            target,
            page.status.as_u16()
        );
        Ok(())
    }

    pub async fn check_content(&self, target: &str) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        ensure!(
            page.body.chars().count() > MIN_PAGE_LENGTH,
            "Page {} has insufficient content ({} characters)",
            target,
            page.body.chars().count()
        );
        Ok(())
    }

    pub async fn check_document_shell(&self, target: &str) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        let missing = missing_shell_tags(&page.body);
        ensure!(
            missing.is_empty(),
            "Page {} missing {}",
            target,
            missing
                .iter()
                .map(|t| format!("<{}>", t))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    pub async fn check_meta(&self, target: &str, tag: MetaTag) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        ensure!(
            has_element(&page.body, tag.selector()),
            "Page {} missing {} meta tag",
            target,
            tag.as_str()
        );
        Ok(())
    }

    /// Every internal link on `target` answers 200.
    ///
    /// Each distinct resolved URL is fetched once; all failures are reported
    /// together.
    pub async fn check_internal_links(&self, target: &str) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        let hrefs = attribute_values(&page.body, "a[href]", "href");

        let mut seen = HashSet::new();
        let mut failures = Vec::new();

        for href in hrefs {
            let LinkKind::Internal(path) = classify_link(&href) else {
                continue;
            };
            let resolved = match page.url.join(&path) {
                Ok(url) => url,
                Err(e) => {
                    failures.push(format!("{} -> {}", path, e));
                    continue;
                }
            };
            if !seen.insert(resolved.clone()) {
                continue;
            }
            if let Some(failure) = self.probe(&path, resolved).await {
                failures.push(failure);
            }
        }

        debug!("{}: checked {} internal link target(s)", target, seen.len());
        broken(target, "internal links", failures)
    }

    /// Local images or scripts referenced by `target` all answer 200.
    pub async fn check_references(&self, target: &str, kind: Reference) -> CheckResult<()> {
        let page = self.fetch(target).await?;
        let sources = attribute_values(&page.body, kind.selector(), "src");

        let mut seen = HashSet::new();
        let mut failures = Vec::new();

        for src in sources {
            if src.starts_with("http://") || src.starts_with("https://") {
                continue;
            }
            let resolved = match page.url.join(&src) {
                Ok(url) => url,
                Err(e) => {
                    failures.push(format!("{} -> {}", src, e));
                    continue;
                }
            };
            if !seen.insert(resolved.clone()) {
                continue;
            }
            if let Some(failure) = self.probe(&src, resolved).await {
                failures.push(failure);
            }
        }

        broken(target, kind.as_str(), failures)
    }

    async fn probe(&self, reference: &str, url: Url) -> Option<String> {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => None,
            Ok(resp) => Some(format!("{} -> {}", reference, resp.status().as_u16())),
            Err(e) => Some(format!("{} -> {}", reference, e)),
        }
    }

    /// A site asset answers 200 with a body longer than `min_len` bytes.
    pub async fn check_asset(&self, path: &str, min_len: usize) -> CheckResult<()> {
        let url = self.url_for(path)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        ensure!(status == StatusCode::OK, "{} returned {}", path, status.as_u16());

        let bytes = response.bytes().await?;
        ensure!(
            bytes.len() > min_len,
            "{} is too small ({} bytes)",
            path,
            bytes.len()
        );
        Ok(())
    }

    /// A third-party resource is reachable.
    ///
    /// Hosts that reject HEAD get a GET; redirects are followed and any
    /// status in [`EXTERNAL_OK_STATUSES`] is accepted.
    pub async fn check_external(&self, resource: &str) -> CheckResult<()> {
        let url = Url::parse(resource)?;
        let request = if requires_get(&url) {
            self.external.get(url)
        } else {
            self.external.head(url)
        };

        let status = request
            .send()
            .await
            .map_err(|e| {
                CheckError::Assertion(format!(
                    "External resource {} not accessible: {}",
                    resource, e
                ))
            })?
            .status()
            .as_u16();

        ensure!(
            EXTERNAL_OK_STATUSES.contains(&status),
            "External resource {} returned {}",
            resource,
            status
        );
        Ok(())
    }
}

fn broken(page: &str, kind: &str, failures: Vec<String>) -> CheckResult<()> {
    if failures.is_empty() {
        return Ok(());
    }
    Err(CheckError::BrokenReferences {
        page: page.to_string(),
        kind: kind.to_string(),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://github.com/marcusbakker", LinkKind::External ; "https")]
    #[test_case("http://example.com", LinkKind::External ; "http")]
    #[test_case("mailto:info@example.com", LinkKind::Mailto ; "mailto")]
    #[test_case("tel:+31000000", LinkKind::Tel ; "tel")]
    #[test_case("#contact", LinkKind::Anchor ; "anchor")]
    #[test_case("../index.html#about", LinkKind::Internal("../index.html".into()) ; "path with anchor")]
    #[test_case("/blog/page/2/", LinkKind::Internal("/blog/page/2/".into()) ; "absolute path")]
    fn test_classify_link(href: &str, expected: LinkKind) {
        assert_eq!(classify_link(href), expected);
    }

    #[test_case("https://www.linkedin.com/in/someone", true ; "linkedin subdomain")]
    #[test_case("https://github.com/someone", true ; "github")]
    #[test_case("https://gist.github.com/x", true ; "github subdomain")]
    #[test_case("https://evillinkedin.com/", false ; "lookalike host")]
    #[test_case("https://fonts.googleapis.com/css", false ; "fonts")]
    fn test_requires_get(url: &str, expected: bool) {
        assert_eq!(requires_get(&Url::parse(url).unwrap()), expected);
    }

    #[test]
    fn test_attribute_values() {
        let html = r#"<html><body>
            <a href="/a.html">A</a><a>no href</a><a href="b.html#x">B</a>
            <img src="/images/logo.png" alt="logo"><script src="/assets/js/main.js"></script>
        </body></html>"#;
        assert_eq!(attribute_values(html, "a[href]", "href"), vec!["/a.html", "b.html#x"]);
        assert_eq!(attribute_values(html, "img[src]", "src"), vec!["/images/logo.png"]);
        assert_eq!(attribute_values(html, "script[src]", "src"), vec!["/assets/js/main.js"]);
    }

    #[test]
    fn test_meta_selectors() {
        let html = r#"<html><head><meta charset="utf-8">
            <meta name="viewport" content="width=device-width"></head><body></body></html>"#;
        assert!(has_element(html, MetaTag::Charset.selector()));
        assert!(has_element(html, MetaTag::Viewport.selector()));
        assert!(!has_element(html, MetaTag::Description.selector()));
    }

    #[test]
    fn test_missing_shell_tags_reads_source() {
        assert!(missing_shell_tags(
            "<!DOCTYPE html><HTML lang=en><head><title>x</title></head><body></body></HTML>"
        )
        .is_empty());
        assert_eq!(
            missing_shell_tags("<p>fragment</p>"),
            vec!["html", "head", "body", "title"]
        );
        // <header> is not <head>
        assert_eq!(
            missing_shell_tags("<html><header></header><body><title>t</title></body></html>"),
            vec!["head"]
        );
    }
}
