//! Lighthouse adapter against a scripted stand-in binary

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use sitecheck::audit::{Category, LighthouseRunner};
use sitecheck::config::LighthouseSettings;
use sitecheck::CheckError;

const REPORT: &str = r#"{"categories":{"performance":{"score":0.87},"seo":{"score":1}},"audits":{"largest-contentful-paint":{"numericValue":2100.5,"score":0.9}}}"#;

/// Shell script that fails with NO_FCP `failures` times, then writes REPORT
fn flaky_script(dir: &Path, failures: u32) -> PathBuf {
    let counter = dir.join("attempts");
    let script = dir.join("fake-lighthouse.sh");
    let body = format!(
        r#"if [ "$1" = "--version" ]; then echo 12.0.0; exit 0; fi
n=$(cat "{counter}" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "{counter}"
if [ "$n" -le {failures} ]; then
  echo "Runtime error encountered: NO_FCP The page did not paint any content" >&2
  exit 1
fi
for arg in "$@"; do
  case "$arg" in
    --output-path=*) printf '%s' '{report}' > "${{arg#--output-path=}}" ;;
  esac
done
"#,
        counter = counter.display(),
        failures = failures,
        report = REPORT,
    );
    std::fs::write(&script, body).unwrap();
    script
}

fn runner(script: &Path, max_attempts: u32) -> LighthouseRunner {
    LighthouseRunner::new(&LighthouseSettings {
        binary: PathBuf::from("sh"),
        args: vec![script.display().to_string()],
        timeout_secs: 30,
        max_attempts,
        retry_backoff_ms: 10,
        ..Default::default()
    })
}

fn attempts(dir: &Path) -> u32 {
    std::fs::read_to_string(dir.join("attempts"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_retries_no_fcp_then_parses_report() {
    let dir = tempfile::tempdir().unwrap();
    let script = flaky_script(dir.path(), 2);
    let runner = runner(&script, 3);

    assert!(runner.is_available().await);
    let report = runner
        .run("http://127.0.0.1:8000/index.html", &[Category::Performance])
        .await
        .unwrap();

    assert_eq!(attempts(dir.path()), 3);
    assert_eq!(report.score(Category::Performance), Some(87));
    assert_eq!(report.score(Category::Seo), Some(100));
    assert_eq!(report.score(Category::Accessibility), None);
    assert_eq!(report.audit_numeric("largest-contentful-paint"), Some(2100.5));
}

#[tokio::test]
async fn test_exhausted_retries_carry_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = flaky_script(dir.path(), 5);
    let runner = runner(&script, 3);

    let err = runner
        .run("http://127.0.0.1:8000/index.html", &Category::all())
        .await
        .unwrap_err();

    assert_eq!(attempts(dir.path()), 3);
    match err {
        CheckError::AuditRetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("NO_FCP"));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("broken.sh");
    std::fs::write(
        &script,
        format!(
            "echo 1 >> \"{}\"\necho 'Chrome crashed' >&2\nexit 2\n",
            dir.path().join("calls").display()
        ),
    )
    .unwrap();

    let err = runner(&script, 3)
        .run("http://127.0.0.1:8000/", &[Category::Seo])
        .await
        .unwrap_err();

    assert!(matches!(err, CheckError::AuditFailed(ref msg) if msg.contains("Chrome crashed")));
    let calls = std::fs::read_to_string(dir.path().join("calls")).unwrap();
    assert_eq!(calls.lines().count(), 1);
}

#[tokio::test]
async fn test_missing_binary_is_reported_as_missing_tool() {
    let runner = LighthouseRunner::new(&LighthouseSettings {
        binary: PathBuf::from("/definitely/not/lighthouse"),
        ..Default::default()
    });

    assert!(!runner.is_available().await);
    let err = runner
        .run("http://127.0.0.1:8000/", &[Category::Performance])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::AuditToolMissing(_)));
}

#[tokio::test]
async fn test_timeout_kills_a_hung_audit() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("hang.sh");
    std::fs::write(&script, "sleep 30\n").unwrap();

    let runner = LighthouseRunner::new(&LighthouseSettings {
        binary: PathBuf::from("sh"),
        args: vec![script.display().to_string()],
        timeout_secs: 1,
        max_attempts: 1,
        ..Default::default()
    });

    let started = std::time::Instant::now();
    let err = runner
        .run("http://127.0.0.1:8000/", &[Category::Performance])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(10));
}
