//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::lighthouse::ScoreThresholds;
use crate::error::{CheckError, CheckResult};
use crate::playwright::Browser;

/// Top-level harness configuration.
///
/// Every field has a default, so a YAML file only needs to name what it
/// changes. CLI flags are applied on top of whatever the file provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root of the website file tree
    pub site_root: PathBuf,

    /// Content directory (relative to the site root) scanned for posts
    pub content_dir: PathBuf,

    /// File name that marks a section index inside the content directory
    pub index_file: String,

    /// Extension of content pages
    pub content_extension: String,

    /// Pages always under test, ahead of the discovered posts
    pub fixed_pages: Vec<String>,

    /// Post used by single-post checks when it exists
    pub preferred_post: String,

    pub server: ServerSettings,
    pub http: HttpSettings,
    pub browser: BrowserSettings,
    pub visual: VisualSettings,
    pub lighthouse: LighthouseSettings,

    /// axe-core bundle injected for accessibility audits
    pub axe_script_url: String,

    /// Third-party resources the site links to
    pub external_resources: Vec<String>,

    /// Images that must be served
    pub images: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("."),
            content_dir: PathBuf::from("blog"),
            index_file: "index.html".to_string(),
            content_extension: "html".to_string(),
            fixed_pages: vec![
                "/index.html".to_string(),
                "/services/index.html".to_string(),
                "/blog/index.html".to_string(),
                "/blog/page/2/index.html".to_string(),
            ],
            preferred_post: "/blog/2020/4/the-sources-for-hunts-and-how-to-prioritise.html"
                .to_string(),
            server: ServerSettings::default(),
            http: HttpSettings::default(),
            browser: BrowserSettings::default(),
            visual: VisualSettings::default(),
            lighthouse: LighthouseSettings::default(),
            axe_script_url: "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.2/axe.min.js"
                .to_string(),
            external_resources: vec![
                "https://fonts.googleapis.com/css?family=Open+Sans:400,400italic,700,700italic|Open+Sans+Condensed:700".to_string(),
                "https://www.linkedin.com/in/marcusbakker".to_string(),
                "https://github.com/marcusbakker".to_string(),
            ],
            images: vec!["/images/logo.png".to_string(), "/images/marcus.jpg".to_string()],
        }
    }
}

impl HarnessConfig {
    /// Parse a config from a YAML string
    pub fn from_yaml(yaml: &str) -> CheckResult<Self> {
        serde_yaml::from_str(yaml).map_err(CheckError::from)
    }

    /// Parse a config from a YAML file
    pub fn from_file(path: &Path) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> CheckResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CheckResult<()> {
        if !self.site_root.is_dir() {
            return Err(CheckError::InvalidConfig(format!(
                "site root {} is not a directory",
                self.site_root.display()
            )));
        }
        if !(0.0..=100.0).contains(&self.visual.threshold) {
            return Err(CheckError::InvalidConfig(format!(
                "visual threshold {} is outside 0-100",
                self.visual.threshold
            )));
        }
        if self.lighthouse.max_attempts == 0 {
            return Err(CheckError::InvalidConfig(
                "lighthouse.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,

    /// Fixed port; 0 binds an ephemeral one
    pub port: u16,

    pub startup_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            startup_timeout_ms: 5_000,
        }
    }
}

impl ServerSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub external_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            external_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub browsers: Vec<Browser>,
    pub headless: bool,

    /// Fixed delay after navigation; the site exposes no readiness signal
    pub settle_ms: u64,

    /// Directory holding the `playwright` node module, exported as NODE_PATH
    pub node_path: Option<PathBuf>,

    pub node_binary: PathBuf,

    /// Per-command timeout for the Playwright driver
    pub command_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browsers: Browser::all().to_vec(),
            headless: true,
            settle_ms: 500,
            node_path: None,
            node_binary: PathBuf::from("node"),
            command_timeout_ms: 30_000,
        }
    }
}

impl BrowserSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    pub snapshot_dir: PathBuf,

    /// Maximum differing-byte percentage (0-100)
    pub threshold: f64,

    pub update_snapshots: bool,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("tests/snapshots"),
            threshold: 0.1,
            update_snapshots: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LighthouseSettings {
    pub binary: PathBuf,

    /// Arguments placed before the audit flags, e.g. `["lighthouse"]` with `binary: npx`
    pub args: Vec<String>,

    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub thresholds: ScoreThresholds,
}

impl Default for LighthouseSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("lighthouse"),
            args: Vec::new(),
            timeout_secs: 180,
            max_attempts: 3,
            retry_backoff_ms: 2_000,
            thresholds: ScoreThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.visual.threshold, 0.1);
        assert_eq!(config.lighthouse.timeout_secs, 180);
        assert_eq!(config.lighthouse.max_attempts, 3);
        assert_eq!(config.fixed_pages.len(), 4);
        assert!(!config.visual.update_snapshots);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
site_root: /srv/site
server:
  port: 0
visual:
  threshold: 0.5
browser:
  browsers: [chromium]
"#;
        let config = HarnessConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.site_root, PathBuf::from("/srv/site"));
        assert_eq!(config.server.port, 0);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.visual.threshold, 0.5);
        assert_eq!(config.visual.snapshot_dir, PathBuf::from("tests/snapshots"));
        assert_eq!(config.browser.browsers, vec![Browser::Chromium]);
        assert_eq!(config.browser.settle_ms, 500);
    }

    #[test]
    fn test_validate_rejects_missing_site_root() {
        let config = HarnessConfig {
            site_root: PathBuf::from("/definitely/not/a/site/root"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CheckError::InvalidConfig(_))));
    }
}
