//! Playwright browser automation
//!
//! One long-lived `node` process per browser engine runs an embedded driver
//! script. Requests and replies are JSON lines over the child's stdin/stdout:
//!
//! ```text
//! -> {"id":7,"op":"goto","page":2,"args":{"url":"http://127.0.0.1:8000/"}}
//! <- {"id":7,"ok":true,"value":null}
//! ```
//!
//! Each test case gets a fresh browser context via [`PlaywrightDriver::new_page`].

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::BrowserSettings;
use crate::error::{CheckError, CheckResult};
use crate::session::{BoundingBox, BrowserSession, ScreenshotOptions, SessionProvider};
use crate::viewport::Viewport;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    pub fn all() -> [Browser; 3] {
        [Browser::Chromium, Browser::Firefox, Browser::Webkit]
    }
}

impl FromStr for Browser {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(CheckError::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    id: u64,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u64>,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriverGreeting {
    ready: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Handle to a running Playwright driver process for one engine
pub struct PlaywrightDriver {
    browser: Browser,
    io: Mutex<DriverIo>,
    child: Mutex<Option<Child>>,
    next_id: AtomicU64,
    command_timeout: Duration,
    capture_dir: TempDir,
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Check that node can load the playwright module
    pub fn check_playwright_installed(settings: &BrowserSettings) -> CheckResult<()> {
        let mut cmd = Command::new(&settings.node_binary);
        cmd.args(["-e", "require('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(CheckError::PlaywrightNotFound(
                "node cannot load 'playwright'. Install with: npm install playwright && npx playwright install".to_string(),
            )),
            Err(e) => Err(CheckError::PlaywrightNotFound(format!(
                "{}: {}",
                settings.node_binary.display(),
                e
            ))),
        }
    }

    /// Spawn the driver and launch `browser`
    pub async fn launch(browser: Browser, settings: &BrowserSettings) -> CheckResult<Arc<Self>> {
        Self::check_playwright_installed(settings)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;
        let capture_dir = tempfile::tempdir()?;

        info!("Launching {} (headless: {})", browser, settings.headless);

        let mut cmd = TokioCommand::new(&settings.node_binary);
        cmd.arg(&script_path)
            .arg(browser.as_str())
            .arg(settings.headless.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            CheckError::Playwright(format!("failed to spawn {}: {}", settings.node_binary.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CheckError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CheckError::Playwright("driver stdout unavailable".to_string()))?;
        let mut stdout = BufReader::new(stdout);

        let greeting = read_greeting(&mut stdout).await?;
        if !greeting.ready {
            return Err(CheckError::Playwright(format!(
                "{} failed to launch: {}",
                browser,
                greeting.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        debug!(
            "{} ready (version {})",
            browser,
            greeting.version.as_deref().unwrap_or("unknown")
        );

        Ok(Arc::new(Self {
            browser,
            io: Mutex::new(DriverIo { stdin, stdout }),
            child: Mutex::new(Some(child)),
            next_id: AtomicU64::new(1),
            command_timeout: Duration::from_millis(settings.command_timeout_ms),
            capture_dir,
            _script_dir: script_dir,
        }))
    }

    pub fn browser(&self) -> Browser {
        self.browser
    }

    /// Send one request and wait for its reply
    async fn execute(&self, op: &str, page: Option<u64>, args: Value) -> CheckResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::to_string(&DriverRequest { id, op, page, args })?;
        trace!("driver -> {}", request);

        let mut io = self.io.lock().await;
        io.stdin.write_all(request.as_bytes()).await?;
        io.stdin.write_all(b"\n").await?;
        io.stdin.flush().await?;

        // Driver-side timeouts fire first; this bounds a hung process
        let deadline = self.command_timeout + Duration::from_secs(5);
        let reply = timeout(deadline, read_reply(&mut io.stdout, id))
            .await
            .map_err(|_| CheckError::Timeout(format!("{} reply from {}", op, self.browser)))??;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(CheckError::Playwright(format!(
                "{}: {}",
                op,
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }

    async fn execute_as<T: DeserializeOwned>(
        &self,
        op: &str,
        page: Option<u64>,
        args: Value,
    ) -> CheckResult<T> {
        let value = self.execute(op, page, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Open a page in a fresh context
    pub async fn new_page(self: &Arc<Self>, viewport: Viewport) -> CheckResult<PlaywrightPage> {
        let id: u64 = self
            .execute_as(
                "newPage",
                None,
                json!({
                    "viewport": viewport,
                    "ignoreHttpsErrors": true,
                    "timeout": self.command_timeout.as_millis() as u64,
                }),
            )
            .await?;
        Ok(PlaywrightPage {
            driver: Arc::clone(self),
            id,
            captures: AtomicU64::new(0),
        })
    }

    /// Close the browser and stop the driver process
    pub async fn shutdown(&self) {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };

        info!("Stopping {} driver", self.browser);
        if let Err(e) = self.execute("shutdown", None, json!({})).await {
            debug!("Driver shutdown request failed: {}", e);
        }

        if timeout(SHUTDOWN_WAIT, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                if timeout(Duration::from_millis(500), child.wait()).await.is_ok() {
                    return;
                }
            }
        }

        warn!("{} driver did not exit; killing", self.browser);
        let _ = child.kill().await;
    }
}

async fn read_greeting(stdout: &mut BufReader<ChildStdout>) -> CheckResult<DriverGreeting> {
    let read = async {
        loop {
            let mut line = String::new();
            if stdout.read_line(&mut line).await? == 0 {
                return Err(CheckError::Playwright(
                    "driver exited before reporting ready".to_string(),
                ));
            }
            if let Ok(greeting) = serde_json::from_str::<DriverGreeting>(line.trim()) {
                return Ok(greeting);
            }
            trace!("driver noise: {}", line.trim());
        }
    };
    timeout(LAUNCH_TIMEOUT, read)
        .await
        .map_err(|_| CheckError::Timeout("browser launch".to_string()))?
}

async fn read_reply(stdout: &mut BufReader<ChildStdout>, id: u64) -> CheckResult<DriverReply> {
    loop {
        let mut line = String::new();
        if stdout.read_line(&mut line).await? == 0 {
            return Err(CheckError::Playwright("driver exited".to_string()));
        }
        trace!("driver <- {}", line.trim());

        // Skip console noise and replies to requests that already timed out
        match serde_json::from_str::<DriverReply>(line.trim()) {
            Ok(reply) if reply.id == Some(id) => return Ok(reply),
            Ok(reply) if reply.id.is_none() && !reply.ok => {
                return Err(CheckError::Playwright(
                    reply.error.unwrap_or_else(|| "malformed request".to_string()),
                ))
            }
            _ => continue,
        }
    }
}

/// A page in its own browser context
pub struct PlaywrightPage {
    driver: Arc<PlaywrightDriver>,
    id: u64,
    captures: AtomicU64,
}

impl PlaywrightPage {
    pub fn browser(&self) -> Browser {
        self.driver.browser()
    }

    async fn call(&self, op: &str, args: Value) -> CheckResult<Value> {
        self.driver.execute(op, Some(self.id), args).await
    }

    async fn call_as<T: DeserializeOwned>(&self, op: &str, args: Value) -> CheckResult<T> {
        self.driver.execute_as(op, Some(self.id), args).await
    }
}

#[async_trait]
impl BrowserSession for PlaywrightPage {
    async fn goto(&self, url: &str) -> CheckResult<()> {
        debug!("goto {}", url);
        self.call("goto", json!({ "url": url })).await.map(|_| ())
    }

    async fn title(&self) -> CheckResult<String> {
        self.call_as("title", json!({})).await
    }

    async fn url(&self) -> CheckResult<String> {
        self.call_as("url", json!({})).await
    }

    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()> {
        self.call("setViewport", json!({ "viewport": viewport }))
            .await
            .map(|_| ())
    }

    async fn wait_for_timeout(&self, duration: Duration) -> CheckResult<()> {
        self.call("waitForTimeout", json!({ "ms": duration.as_millis() as u64 }))
            .await
            .map(|_| ())
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> CheckResult<()> {
        self.call(
            "waitForUrl",
            json!({ "pattern": pattern, "timeout": timeout.as_millis() as u64 }),
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> CheckResult<()> {
        self.call(
            "waitForFunction",
            json!({ "expression": expression, "timeout": timeout.as_millis() as u64 }),
        )
        .await
        .map(|_| ())
    }

    async fn evaluate(&self, expression: &str) -> CheckResult<Value> {
        self.call("evaluate", json!({ "expression": expression })).await
    }

    async fn count(&self, selector: &str) -> CheckResult<usize> {
        self.call_as("count", json!({ "selector": selector })).await
    }

    async fn is_visible(&self, selector: &str) -> CheckResult<bool> {
        self.call_as("isVisible", json!({ "selector": selector })).await
    }

    async fn in_viewport(&self, selector: &str) -> CheckResult<bool> {
        self.call_as("inViewport", json!({ "selector": selector })).await
    }

    async fn get_attribute(&self, selector: &str, name: &str) -> CheckResult<Option<String>> {
        self.call_as("getAttribute", json!({ "selector": selector, "name": name }))
            .await
    }

    async fn text_content(&self, selector: &str) -> CheckResult<Option<String>> {
        self.call_as("textContent", json!({ "selector": selector })).await
    }

    async fn bounding_box(&self, selector: &str) -> CheckResult<Option<BoundingBox>> {
        self.call_as("boundingBox", json!({ "selector": selector })).await
    }

    async fn click(&self, selector: &str) -> CheckResult<()> {
        self.call("click", json!({ "selector": selector })).await.map(|_| ())
    }

    async fn hover(&self, selector: &str) -> CheckResult<()> {
        self.call("hover", json!({ "selector": selector })).await.map(|_| ())
    }

    async fn focus(&self, selector: &str) -> CheckResult<()> {
        self.call("focus", json!({ "selector": selector })).await.map(|_| ())
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> CheckResult<()> {
        self.call("press", json!({ "selector": selector, "key": key }))
            .await
            .map(|_| ())
    }

    async fn add_script_tag(&self, url: &str) -> CheckResult<()> {
        self.call("addScriptTag", json!({ "url": url })).await.map(|_| ())
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> CheckResult<Vec<u8>> {
        let n = self.captures.fetch_add(1, Ordering::Relaxed);
        let path = self
            .driver
            .capture_dir
            .path()
            .join(format!("page{}-{}.png", self.id, n));

        self.call(
            "screenshot",
            json!({
                "path": path_str(&path),
                "selector": options.selector,
                "fullPage": options.full_page,
            }),
        )
        .await?;

        let bytes = std::fs::read(&path)?;
        let _ = std::fs::remove_file(&path);
        Ok(bytes)
    }

    async fn close(&self) -> CheckResult<()> {
        self.call("closePage", json!({})).await.map(|_| ())
    }
}

/// Launches one driver per engine on first use and keeps it for the session
pub struct PlaywrightProvider {
    settings: BrowserSettings,
    drivers: Mutex<HashMap<Browser, Result<Arc<PlaywrightDriver>, String>>>,
}

impl PlaywrightProvider {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            drivers: Mutex::new(HashMap::new()),
        }
    }

    async fn driver(&self, browser: Browser) -> CheckResult<Arc<PlaywrightDriver>> {
        let mut drivers = self.drivers.lock().await;
        if let Some(entry) = drivers.get(&browser) {
            return entry.clone().map_err(CheckError::PlaywrightNotFound);
        }

        // A failed launch is remembered so later cases skip immediately
        match PlaywrightDriver::launch(browser, &self.settings).await {
            Ok(driver) => {
                drivers.insert(browser, Ok(Arc::clone(&driver)));
                Ok(driver)
            }
            Err(e) => {
                let reason = match e {
                    CheckError::PlaywrightNotFound(reason) => reason,
                    other => other.to_string(),
                };
                warn!("{} unavailable: {}", browser, reason);
                drivers.insert(browser, Err(reason.clone()));
                Err(CheckError::PlaywrightNotFound(reason))
            }
        }
    }
}

#[async_trait]
impl SessionProvider for PlaywrightProvider {
    async fn open(&self, browser: Browser, viewport: Viewport) -> CheckResult<Arc<dyn BrowserSession>> {
        let driver = self.driver(browser).await?;
        let page = driver.new_page(viewport).await?;
        Ok(Arc::new(page))
    }

    async fn shutdown(&self) {
        let drivers = std::mem::take(&mut *self.drivers.lock().await);
        for driver in drivers.into_values().flatten() {
            driver.shutdown().await;
        }
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

const DRIVER_JS: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const [engine, headlessArg] = process.argv.slice(2);
const headless = headlessArg !== 'false';
const pages = new Map();
let nextPage = 1;
let browser;

function reply(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function pageOf(req) {
  const entry = pages.get(req.page);
  if (!entry) throw new Error(`unknown page ${req.page}`);
  return entry.page;
}

function first(req) {
  return pageOf(req).locator(req.args.selector).first();
}

const handlers = {
  async newPage(req) {
    const context = await browser.newContext({
      viewport: req.args.viewport,
      ignoreHTTPSErrors: req.args.ignoreHttpsErrors,
    });
    const page = await context.newPage();
    page.setDefaultTimeout(req.args.timeout);
    const id = nextPage++;
    pages.set(id, { context, page });
    return id;
  },
  async closePage(req) {
    const entry = pages.get(req.page);
    if (entry) {
      pages.delete(req.page);
      await entry.context.close();
    }
    return null;
  },
  async goto(req) { await pageOf(req).goto(req.args.url); return null; },
  async title(req) { return await pageOf(req).title(); },
  async url(req) { return pageOf(req).url(); },
  async setViewport(req) { await pageOf(req).setViewportSize(req.args.viewport); return null; },
  async waitForTimeout(req) { await pageOf(req).waitForTimeout(req.args.ms); return null; },
  async waitForUrl(req) {
    await pageOf(req).waitForURL(req.args.pattern, { timeout: req.args.timeout });
    return null;
  },
  async waitForFunction(req) {
    await pageOf(req).waitForFunction(req.args.expression, null, { timeout: req.args.timeout });
    return null;
  },
  async evaluate(req) {
    const value = await pageOf(req).evaluate(req.args.expression);
    return value === undefined ? null : value;
  },
  async count(req) { return await pageOf(req).locator(req.args.selector).count(); },
  async isVisible(req) { return await first(req).isVisible(); },
  async inViewport(req) {
    return await first(req).evaluate((el) => {
      const r = el.getBoundingClientRect();
      return r.width > 0 && r.height > 0 && r.bottom > 0 && r.right > 0 &&
        r.top < window.innerHeight && r.left < window.innerWidth;
    });
  },
  async getAttribute(req) { return await first(req).getAttribute(req.args.name); },
  async textContent(req) { return await first(req).textContent(); },
  async boundingBox(req) { return await first(req).boundingBox(); },
  async click(req) { await first(req).click(); return null; },
  async hover(req) { await first(req).hover(); return null; },
  async focus(req) { await first(req).focus(); return null; },
  async press(req) {
    if (req.args.selector) await first(req).press(req.args.key);
    else await pageOf(req).keyboard.press(req.args.key);
    return null;
  },
  async addScriptTag(req) { await pageOf(req).addScriptTag({ url: req.args.url }); return null; },
  async screenshot(req) {
    const options = { path: req.args.path, animations: 'disabled' };
    if (req.args.selector) await first(req).screenshot(options);
    else await pageOf(req).screenshot({ ...options, fullPage: !!req.args.fullPage });
    return req.args.path;
  },
  async shutdown() {
    await browser.close();
    setImmediate(() => process.exit(0));
    return null;
  },
};

(async () => {
  try {
    browser = await playwright[engine].launch({ headless });
  } catch (error) {
    reply({ ready: false, error: error.message });
    process.exit(1);
  }
  reply({ ready: true, version: browser.version() });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (error) {
      reply({ id: null, ok: false, error: `bad request: ${error.message}` });
      continue;
    }
    const handler = handlers[req.op];
    if (!handler) {
      reply({ id: req.id, ok: false, error: `unknown op ${req.op}` });
      continue;
    }
    try {
      reply({ id: req.id, ok: true, value: await handler(req) });
    } catch (error) {
      reply({ id: req.id, ok: false, error: error.message });
    }
  }
  await browser.close();
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_parse() {
        assert_eq!("Chromium".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("opera".parse::<Browser>().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let request = DriverRequest {
            id: 7,
            op: "goto",
            page: Some(2),
            args: json!({ "url": "http://127.0.0.1:8000/" }),
        };
        let line = serde_json::to_string(&request).unwrap();
        assert_eq!(
            line,
            r#"{"id":7,"op":"goto","page":2,"args":{"url":"http://127.0.0.1:8000/"}}"#
        );

        let no_page = DriverRequest {
            id: 1,
            op: "shutdown",
            page: None,
            args: json!({}),
        };
        assert!(!serde_json::to_string(&no_page).unwrap().contains("page"));
    }

    #[test]
    fn test_reply_parsing() {
        let ok: DriverReply = serde_json::from_str(r#"{"id":3,"ok":true,"value":4}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value, json!(4));

        let err: DriverReply =
            serde_json::from_str(r#"{"id":3,"ok":false,"error":"Timeout 30000ms exceeded"}"#)
                .unwrap();
        assert!(!err.ok);
        assert_eq!(err.value, Value::Null);
        assert_eq!(err.error.as_deref(), Some("Timeout 30000ms exceeded"));
    }

    #[test]
    fn test_driver_script_handles_every_session_op() {
        for op in [
            "newPage", "closePage", "goto", "title", "url", "setViewport", "waitForTimeout",
            "waitForUrl", "waitForFunction", "evaluate", "count", "isVisible", "inViewport",
            "getAttribute", "textContent", "boundingBox", "click", "hover", "focus", "press",
            "addScriptTag", "screenshot", "shutdown",
        ] {
            assert!(DRIVER_JS.contains(&format!("async {}(", op)), "driver lacks {}", op);
        }
        assert!(DRIVER_JS.contains("animations: 'disabled'"));
    }
}
