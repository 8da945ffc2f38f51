//! Error types for the site harness

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server readiness probe failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not available: {0}")]
    PlaywrightNotFound(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Broken {kind} on {page}: {}", .failures.join(", "))]
    BrokenReferences {
        page: String,
        kind: String,
        failures: Vec<String>,
    },

    #[error(
        "Screenshot {name} differs by {diff_percent:.2}% (threshold: {threshold}%). Actual saved to: {}",
        .actual_path.display()
    )]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
        actual_path: PathBuf,
    },

    #[error("Baseline {} is unreadable: {reason}", .path.display())]
    BaselineUnreadable { path: PathBuf, reason: String },

    #[error("Audit tool not found: {0}")]
    AuditToolMissing(String),

    #[error("Audit failed: {0}")]
    AuditFailed(String),

    #[error("Audit failed after {attempts} attempts: {last_error}")]
    AuditRetriesExhausted { attempts: u32, last_error: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Fail the current check with a formatted message unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::CheckError::Assertion(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded(value: u32) -> CheckResult<u32> {
        ensure!(value > 2, "value {} is too small", value);
        Ok(value)
    }

    #[test]
    fn test_ensure_formats_message() {
        let err = guarded(1).unwrap_err();
        assert_eq!(err.to_string(), "Assertion failed: value 1 is too small");
        assert_eq!(guarded(3).unwrap(), 3);
    }

    #[test]
    fn test_broken_references_lists_every_failure() {
        let err = CheckError::BrokenReferences {
            page: "/index.html".to_string(),
            kind: "internal links".to_string(),
            failures: vec!["a.html -> 404".to_string(), "b.html -> 500".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Broken internal links on /index.html: a.html -> 404, b.html -> 500"
        );
    }

    #[test]
    fn test_unreadable_baseline_names_the_file() {
        let err = CheckError::BaselineUnreadable {
            path: PathBuf::from("tests/snapshots/homepage-desktop.png"),
            reason: "The image format could not be determined".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Baseline tests/snapshots/homepage-desktop.png is unreadable: The image format could not be determined"
        );
    }
}
