//! External audit runners
//!
//! - `lighthouse`: performance/SEO scoring via the Lighthouse CLI
//! - `axe`: in-page accessibility audit via axe-core

pub mod axe;
pub mod lighthouse;

pub use axe::{AxeAudit, RunOnly, Violation};
pub use lighthouse::{Category, LighthouseReport, LighthouseRunner, ScoreThresholds};
