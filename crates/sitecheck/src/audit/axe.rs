//! axe-core accessibility audit run inside a browser page

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CheckError, CheckResult};
use crate::session::BrowserSession;

/// WCAG 2.1 AA plus axe best practices
pub const WCAG_TAGS: [&str; 5] = ["wcag2a", "wcag2aa", "wcag21a", "wcag21aa", "best-practice"];

const AXE_READY: &str = "typeof window.axe !== 'undefined'";

/// Which rules an audit runs
#[derive(Debug, Clone, PartialEq)]
pub enum RunOnly {
    Tags(Vec<String>),
    Rules(Vec<String>),
}

impl Default for RunOnly {
    fn default() -> Self {
        RunOnly::Tags(WCAG_TAGS.iter().map(|t| t.to_string()).collect())
    }
}

impl RunOnly {
    pub fn rule(rule: &str) -> Self {
        RunOnly::Rules(vec![rule.to_string()])
    }

    fn to_options(&self) -> Value {
        let (kind, values) = match self {
            RunOnly::Tags(v) => ("tag", v),
            RunOnly::Rules(v) => ("rule", v),
        };
        json!({ "runOnly": { "type": kind, "values": values } })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,

    #[serde(default)]
    pub impact: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "helpUrl")]
    pub help_url: String,

    #[serde(default)]
    pub nodes: Vec<ViolationNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationNode {
    /// Selector path; nested arrays for shadow DOM targets
    #[serde(default)]
    pub target: Vec<Value>,

    #[serde(default)]
    pub html: String,
}

impl ViolationNode {
    pub fn first_target(&self) -> String {
        match self.target.first() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        }
    }
}

impl Violation {
    pub fn is_critical_or_serious(&self) -> bool {
        matches!(self.impact.as_deref(), Some("critical") | Some("serious"))
    }

    /// Whether any affected node matches `selector_fragment` in its target
    /// or `html_fragment` in its markup.
    pub fn touches(&self, selector_fragment: &str, html_fragment: &str) -> bool {
        self.nodes.iter().any(|n| {
            n.first_target().contains(selector_fragment) || n.html.contains(html_fragment)
        })
    }
}

pub fn critical_or_serious(violations: Vec<Violation>) -> Vec<Violation> {
    violations
        .into_iter()
        .filter(Violation::is_critical_or_serious)
        .collect()
}

/// Human-readable listing: impact, description, help URL and up to three
/// affected elements per violation.
pub fn format_violations(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "No violations found".to_string();
    }

    let mut messages = Vec::new();
    for v in violations {
        let impact = v.impact.as_deref().unwrap_or("unknown").to_uppercase();
        let mut nodes: Vec<String> = v
            .nodes
            .iter()
            .take(3)
            .map(|n| format!("  - {}", n.first_target()))
            .collect();
        if v.nodes.len() > 3 {
            nodes.push(format!("  - ... and {} more", v.nodes.len() - 3));
        }

        messages.push(format!(
            "\n[{}] {}\nHelp: {}\nAffected elements:\n{}",
            impact,
            v.description,
            v.help_url,
            nodes.join("\n")
        ));
    }
    messages.join("\n")
}

#[derive(Debug, Deserialize)]
struct AxeResults {
    #[serde(default)]
    violations: Vec<Violation>,
}

/// axe-core loaded into a page on demand
#[derive(Debug, Clone)]
pub struct AxeAudit {
    script_url: String,
    ready_timeout: Duration,
}

impl AxeAudit {
    pub fn new(script_url: impl Into<String>, ready_timeout: Duration) -> Self {
        Self {
            script_url: script_url.into(),
            ready_timeout,
        }
    }

    /// Load axe-core unless the page already has it, then wait for it.
    pub async fn inject(&self, session: &dyn BrowserSession) -> CheckResult<()> {
        if session.evaluate(AXE_READY).await? == Value::Bool(true) {
            return Ok(());
        }

        debug!("Injecting axe-core from {}", self.script_url);
        session.add_script_tag(&self.script_url).await?;
        session
            .wait_for_function(AXE_READY, self.ready_timeout)
            .await
            .map_err(|_| CheckError::Timeout(format!("axe-core from {}", self.script_url)))
    }

    /// Run the audit, optionally scoped to a CSS selector.
    pub async fn run(
        &self,
        session: &dyn BrowserSession,
        context: Option<&str>,
        run_only: &RunOnly,
    ) -> CheckResult<Vec<Violation>> {
        self.inject(session).await?;

        let expression = run_expression(context, run_only)?;
        let results: AxeResults = serde_json::from_value(session.evaluate(&expression).await?)?;
        debug!("axe-core reported {} violation(s)", results.violations.len());
        Ok(results.violations)
    }
}

fn run_expression(context: Option<&str>, run_only: &RunOnly) -> CheckResult<String> {
    let options = serde_json::to_string(&run_only.to_options())?;
    let call = match context {
        Some(selector) => format!("axe.run({}, {})", serde_json::to_string(selector)?, options),
        None => format!("axe.run({})", options),
    };
    Ok(format!("(async () => await {})()", call))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(impact: &str, targets: &[&str]) -> Violation {
        Violation {
            id: "color-contrast".to_string(),
            impact: Some(impact.to_string()),
            description: "Elements must have sufficient color contrast".to_string(),
            help_url: "https://dequeuniversity.com/rules/axe/4.8/color-contrast".to_string(),
            nodes: targets
                .iter()
                .map(|t| ViolationNode {
                    target: vec![json!(t)],
                    html: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_critical_or_serious_filter() {
        let kept = critical_or_serious(vec![
            violation("minor", &["p"]),
            violation("serious", &["a"]),
            violation("critical", &["img"]),
            violation("moderate", &["h3"]),
        ]);
        let impacts: Vec<_> = kept.iter().map(|v| v.impact.as_deref().unwrap()).collect();
        assert_eq!(impacts, vec!["serious", "critical"]);
    }

    #[test]
    fn test_format_truncates_nodes() {
        let text = format_violations(&[violation("serious", &["a", "b", "c", "d", "e"])]);
        assert!(text.contains("[SERIOUS] Elements must have sufficient color contrast"));
        assert!(text.contains("  - c"));
        assert!(!text.contains("  - d"));
        assert!(text.contains("  - ... and 2 more"));
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_violations(&[]), "No violations found");
    }

    #[test]
    fn test_touches_matches_target_or_html() {
        let mut v = violation("serious", &[".button.primary.large"]);
        assert!(v.touches(".large", "button.primary.large"));
        v.nodes[0].target = vec![json!("#banner")];
        v.nodes[0].html = "<a class=\"button.primary.large\">".to_string();
        assert!(v.touches(".large", "button.primary.large"));
        v.nodes[0].html.clear();
        assert!(!v.touches(".large", "button.primary.large"));
    }

    #[test]
    fn test_run_expression_quotes_context() {
        let expr = run_expression(Some("#main"), &RunOnly::rule("color-contrast")).unwrap();
        assert_eq!(
            expr,
            r##"(async () => await axe.run("#main", {"runOnly":{"type":"rule","values":["color-contrast"]}}))()"##
        );

        let expr = run_expression(None, &RunOnly::default()).unwrap();
        assert!(expr.contains(r#""type":"tag""#));
        assert!(expr.contains("wcag21aa"));
    }

    #[test]
    fn test_violation_parses_axe_json() {
        let raw = json!({
            "violations": [{
                "id": "image-alt",
                "impact": "critical",
                "description": "Images must have alternate text",
                "helpUrl": "https://example.invalid/image-alt",
                "nodes": [{"target": [["#host", "img"]], "html": "<img>"}]
            }]
        });
        let results: AxeResults = serde_json::from_value(raw).unwrap();
        assert_eq!(results.violations[0].nodes[0].first_target(), r##"["#host","img"]"##);
    }
}
