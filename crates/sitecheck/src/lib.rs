//! MB Secure site test harness
//!
//! This crate checks the static MB Secure website end to end:
//! - Serves the site tree from an in-process static server
//! - Discovers the pages under test (fixed pages plus every blog post)
//! - Drives Chromium, Firefox and WebKit through a Playwright driver process
//! - Compares screenshots against stored baselines
//! - Wraps axe-core and Lighthouse audits
//! - Checks links, images, scripts and external resources over plain HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TestRunner                             │
//! │    ├── ServerHandle::start(site_root) -> base_url           │
//! │    ├── TargetDiscovery  (fixed pages + sorted posts)        │
//! │    ├── plan(cases, browsers, selection) -> [PlannedCase]    │
//! │    └── run sequentially -> TestSuiteResult                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionContext (shared by every case)                      │
//! │    ├── LinkChecker       static reachability                │
//! │    ├── SnapshotStore     visual baselines                   │
//! │    ├── AxeAudit          in-page accessibility audit        │
//! │    └── LighthouseRunner  subprocess with NO_FCP retries     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionProvider -> BrowserSession                          │
//! │    └── PlaywrightProvider: node driver, JSON lines          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod config;
pub mod discovery;
pub mod error;
pub mod playwright;
pub mod reachability;
pub mod runner;
pub mod server;
pub mod session;
pub mod suites;
pub mod viewport;
pub mod visual;

pub use config::HarnessConfig;
pub use discovery::TargetDiscovery;
pub use error::{CheckError, CheckResult};
pub use playwright::{Browser, PlaywrightProvider};
pub use runner::{CaseStatus, Selection, TestRunner, TestSuiteResult};
pub use server::ServerHandle;
pub use session::{BrowserSession, SessionProvider};
pub use viewport::{Viewport, ViewportClass};
pub use visual::{SnapshotOutcome, SnapshotStore, UPDATE_SNAPSHOTS_ENV};
