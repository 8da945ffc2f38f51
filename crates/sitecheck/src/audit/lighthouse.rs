//! Lighthouse CLI adapter
//!
//! Each audit is one `lighthouse` subprocess writing its JSON report to a
//! temp file. Headless Chrome intermittently reports `NO_FCP` on a cold
//! start; only that signature is retried.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::LighthouseSettings;
use crate::error::{CheckError, CheckResult};

const RETRYABLE_SIGNATURE: &str = "NO_FCP";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const CHROME_FLAGS: &str = "--headless=new --no-sandbox --disable-gpu --disable-dev-shm-usage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Performance,
    Accessibility,
    BestPractices,
    Seo,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Performance => "performance",
            Category::Accessibility => "accessibility",
            Category::BestPractices => "best-practices",
            Category::Seo => "seo",
        }
    }

    pub fn all() -> [Category; 4] {
        [
            Category::Performance,
            Category::Accessibility,
            Category::BestPractices,
            Category::Seo,
        ]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum category scores (0-100).
///
/// Performance and best-practices are relaxed for an unoptimized local
/// server; production targets are 90.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    pub performance: u32,
    pub accessibility: u32,
    pub best_practices: u32,
    pub seo: u32,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            performance: 50,
            accessibility: 95,
            best_practices: 78,
            seo: 90,
        }
    }
}

impl ScoreThresholds {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Performance => self.performance,
            Category::Accessibility => self.accessibility,
            Category::BestPractices => self.best_practices,
            Category::Seo => self.seo,
        }
    }
}

/// Parsed Lighthouse JSON report
#[derive(Debug, Clone)]
pub struct LighthouseReport {
    raw: Value,
}

impl LighthouseReport {
    pub fn from_json(json: &str) -> CheckResult<Self> {
        Ok(Self {
            raw: serde_json::from_str(json)?,
        })
    }

    /// Category score scaled to 0-100 and truncated; `None` if not audited.
    pub fn score(&self, category: Category) -> Option<u32> {
        let entry = self.raw.get("categories")?.get(category.as_str())?;
        let score = entry.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        Some((score * 100.0) as u32)
    }

    /// Scores of every audited category, in category order
    pub fn scores(&self) -> Vec<(Category, u32)> {
        Category::all()
            .into_iter()
            .filter_map(|c| self.score(c).map(|s| (c, s)))
            .collect()
    }

    pub fn audit_numeric(&self, audit: &str) -> Option<f64> {
        self.raw
            .get("audits")?
            .get(audit)?
            .get("numericValue")?
            .as_f64()
    }

    pub fn audit_score(&self, audit: &str) -> Option<f64> {
        self.raw.get("audits")?.get(audit)?.get("score")?.as_f64()
    }

    /// `"<category>: <score> < <threshold>"` for each category under its threshold.
    ///
    /// Categories missing from the report count as 0.
    pub fn failures(&self, categories: &[Category], thresholds: &ScoreThresholds) -> Vec<String> {
        categories
            .iter()
            .filter_map(|&c| {
                let score = self.score(c).unwrap_or(0);
                let threshold = thresholds.get(c);
                (score < threshold).then(|| format!("{}: {} < {}", c, score, threshold))
            })
            .collect()
    }
}

/// One line per score with a check mark against its threshold
pub fn format_scores(scores: &[(Category, u32)], thresholds: &ScoreThresholds) -> String {
    scores
        .iter()
        .map(|&(category, score)| {
            let threshold = thresholds.get(category);
            let status = if score >= threshold { "✓" } else { "✗" };
            format!("  {} {}: {} (threshold: {})", status, category, score, threshold)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs the Lighthouse CLI
#[derive(Debug, Clone)]
pub struct LighthouseRunner {
    binary: PathBuf,
    leading_args: Vec<String>,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl LighthouseRunner {
    pub fn new(settings: &LighthouseSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            leading_args: settings.args.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.leading_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Whether `lighthouse --version` succeeds
    pub async fn is_available(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("--version");
        match timeout(VERSION_PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => {
                debug!(
                    "lighthouse version: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                output.status.success()
            }
            _ => false,
        }
    }

    /// Audit `url` for `categories`, retrying only the known flaky failure.
    pub async fn run(&self, url: &str, categories: &[Category]) -> CheckResult<LighthouseReport> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            info!(
                "Lighthouse {} [{}] (attempt {}/{})",
                url,
                join_categories(categories),
                attempt,
                self.max_attempts
            );

            match self.run_once(url, categories).await {
                Err(CheckError::AuditFailed(stderr)) if is_retryable(&stderr) => {
                    warn!("Lighthouse reported {}; retrying", RETRYABLE_SIGNATURE);
                    last_error = stderr;
                    if attempt < self.max_attempts {
                        sleep(self.backoff).await;
                    }
                }
                other => return other,
            }
        }

        Err(CheckError::AuditRetriesExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn run_once(&self, url: &str, categories: &[Category]) -> CheckResult<LighthouseReport> {
        let output_file = tempfile::Builder::new()
            .prefix("lighthouse-")
            .suffix(".json")
            .tempfile()?;

        let mut output_arg = OsString::from("--output-path=");
        output_arg.push(output_file.path());

        let mut cmd = self.command();
        cmd.arg(url)
            .arg("--output=json")
            .arg(output_arg)
            .arg(format!("--chrome-flags={}", CHROME_FLAGS))
            .arg("--quiet")
            .arg("--throttling-method=provided")
            .arg(format!("--only-categories={}", join_categories(categories)));

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckError::AuditToolMissing(self.binary.display().to_string()))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(CheckError::Timeout(format!(
                    "lighthouse {} after {:?}",
                    url, self.timeout
                )))
            }
        };

        if !output.status.success() {
            return Err(CheckError::AuditFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let json = std::fs::read_to_string(output_file.path())?;
        LighthouseReport::from_json(&json)
    }
}

fn is_retryable(stderr: &str) -> bool {
    stderr.contains(RETRYABLE_SIGNATURE)
}

fn join_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "categories": {
            "performance": {"score": 0.876},
            "accessibility": {"score": 1.0},
            "seo": {"score": null}
        },
        "audits": {
            "largest-contentful-paint": {"numericValue": 2400.5, "score": 0.9},
            "cumulative-layout-shift": {"numericValue": 0.02, "score": 1},
            "render-blocking-resources": {"score": 0.3}
        }
    }"#;

    #[test]
    fn test_scores_are_scaled_and_truncated() {
        let report = LighthouseReport::from_json(REPORT).unwrap();
        assert_eq!(report.score(Category::Performance), Some(87));
        assert_eq!(report.score(Category::Accessibility), Some(100));
        assert_eq!(report.score(Category::Seo), Some(0));
        assert_eq!(report.score(Category::BestPractices), None);
        assert_eq!(
            report.scores(),
            vec![
                (Category::Performance, 87),
                (Category::Accessibility, 100),
                (Category::Seo, 0)
            ]
        );
    }

    #[test]
    fn test_audit_values() {
        let report = LighthouseReport::from_json(REPORT).unwrap();
        assert_eq!(report.audit_numeric("largest-contentful-paint"), Some(2400.5));
        assert_eq!(report.audit_score("render-blocking-resources"), Some(0.3));
        assert_eq!(report.audit_numeric("total-blocking-time"), None);
    }

    #[test]
    fn test_failures_against_thresholds() {
        let report = LighthouseReport::from_json(REPORT).unwrap();
        let failures = report.failures(&Category::all(), &ScoreThresholds::default());
        assert_eq!(failures, vec!["best-practices: 0 < 78", "seo: 0 < 90"]);
    }

    #[test]
    fn test_format_scores() {
        let text = format_scores(
            &[(Category::Performance, 87), (Category::Seo, 40)],
            &ScoreThresholds::default(),
        );
        assert_eq!(
            text,
            "  ✓ performance: 87 (threshold: 50)\n  ✗ seo: 40 (threshold: 90)"
        );
    }

    #[test]
    fn test_only_no_fcp_is_retryable() {
        assert!(is_retryable("Runtime error encountered: NO_FCP"));
        assert!(!is_retryable("Runtime error encountered: PROTOCOL_TIMEOUT"));
    }
}
