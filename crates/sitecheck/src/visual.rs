//! Visual regression testing with screenshot baselines
//!
//! A baseline lives at `snapshot_dir/<name>`. The first capture for a name
//! becomes its baseline and the check is reported as inconclusive; later
//! captures are compared byte-wise against it. Update mode rewrites the
//! baseline in place and passes without comparing.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::VisualSettings;
use crate::error::{CheckError, CheckResult};
use crate::session::{BrowserSession, ScreenshotOptions};

/// Environment variable that switches baseline update mode on.
pub const UPDATE_SNAPSHOTS_ENV: &str = "SITECHECK_UPDATE_SNAPSHOTS";

/// Result of comparing a capture with its baseline
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Whether the difference is within threshold
    pub matches: bool,

    /// Percentage of differing bytes (0.0 - 100.0)
    pub diff_percent: f64,

    pub differing_bytes: u64,
    pub total_bytes: u64,
}

impl Comparison {
    fn hard_mismatch() -> Self {
        Self {
            matches: false,
            diff_percent: 100.0,
            differing_bytes: 0,
            total_bytes: 0,
        }
    }

    fn identical(total_bytes: u64) -> Self {
        Self {
            matches: true,
            diff_percent: 0.0,
            differing_bytes: 0,
            total_bytes,
        }
    }
}

/// What `assert_screenshot` did when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// Compared against an existing baseline and within threshold
    Matched(Comparison),

    /// No baseline existed; the capture was stored and needs review
    BaselineCreated(PathBuf),

    /// Update mode rewrote the baseline; nothing was compared
    BaselineUpdated(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Compare,
    Update,
}

impl UpdateMode {
    /// Update when `flag` is set or the environment asks for it.
    pub fn resolve(flag: bool) -> Self {
        if flag || env_requests_update(std::env::var(UPDATE_SNAPSHOTS_ENV).ok().as_deref()) {
            UpdateMode::Update
        } else {
            UpdateMode::Compare
        }
    }
}

fn env_requests_update(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Something a screenshot can be taken of
#[async_trait]
pub trait Capturable: Send + Sync {
    /// Capture PNG bytes with animations disabled.
    async fn capture(&self, full_page: bool) -> CheckResult<Vec<u8>>;
}

/// The whole page of a browser session
pub struct PageSurface<'a> {
    session: &'a dyn BrowserSession,
}

impl<'a> PageSurface<'a> {
    pub fn new(session: &'a dyn BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<'a> Capturable for PageSurface<'a> {
    async fn capture(&self, full_page: bool) -> CheckResult<Vec<u8>> {
        self.session
            .screenshot(&ScreenshotOptions {
                selector: None,
                full_page,
            })
            .await
    }
}

/// One element of a page, located by CSS selector
pub struct ElementSurface<'a> {
    session: &'a dyn BrowserSession,
    selector: String,
}

impl<'a> ElementSurface<'a> {
    pub fn new(session: &'a dyn BrowserSession, selector: impl Into<String>) -> Self {
        Self {
            session,
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl<'a> Capturable for ElementSurface<'a> {
    // full_page has no meaning for an element capture
    async fn capture(&self, _full_page: bool) -> CheckResult<Vec<u8>> {
        self.session
            .screenshot(&ScreenshotOptions {
                selector: Some(self.selector.clone()),
                full_page: false,
            })
            .await
    }
}

/// Baseline storage and comparison
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    threshold: f64,
    mode: UpdateMode,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, threshold: f64, mode: UpdateMode) -> Self {
        Self {
            dir: dir.into(),
            threshold,
            mode,
        }
    }

    /// Build from settings, reading the update environment variable once.
    pub fn from_settings(settings: &VisualSettings) -> Self {
        Self::new(
            settings.snapshot_dir.clone(),
            settings.threshold,
            UpdateMode::resolve(settings.update_snapshots),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Capture `surface` and check it against the baseline called `name`.
    pub async fn assert_screenshot(
        &self,
        surface: &dyn Capturable,
        name: &str,
        full_page: bool,
        threshold: Option<f64>,
    ) -> CheckResult<SnapshotOutcome> {
        let threshold = threshold.unwrap_or(self.threshold);
        let baseline_path = self.baseline_path(name);

        let captured = surface.capture(full_page).await?;

        let baseline_exists = baseline_path.exists();
        if !baseline_exists || self.mode == UpdateMode::Update {
            save_screenshot(&captured, &baseline_path)?;
            if self.mode == UpdateMode::Update {
                info!("Updated baseline '{}'", name);
                return Ok(SnapshotOutcome::BaselineUpdated(baseline_path));
            }
            info!("Created baseline '{}'", name);
            return Ok(SnapshotOutcome::BaselineCreated(baseline_path));
        }

        let comparison = compare_screenshots(&captured, &baseline_path, threshold)?;
        if comparison.matches {
            debug!("'{}' matches baseline ({:.4}% differ)", name, comparison.diff_percent);
            return Ok(SnapshotOutcome::Matched(comparison));
        }

        let actual_path = self.dir.join(actual_artifact_name(name));
        save_screenshot(&captured, &actual_path)?;
        warn!(
            "Visual regression in '{}': {:.2}% bytes differ (threshold: {}%)",
            name, comparison.diff_percent, threshold
        );

        Err(CheckError::ScreenshotMismatch {
            name: name.to_string(),
            diff_percent: comparison.diff_percent,
            threshold,
            actual_path,
        })
    }
}

/// Compare captured PNG bytes with a stored baseline image.
///
/// A missing baseline compares as a full mismatch. Undecodable data on
/// either side is an error; a bad baseline is reported with its path.
pub fn compare_screenshots(
    actual: &[u8],
    baseline_path: &Path,
    threshold: f64,
) -> CheckResult<Comparison> {
    if !baseline_path.exists() {
        return Ok(Comparison::hard_mismatch());
    }

    let unreadable = |reason: String| CheckError::BaselineUnreadable {
        path: baseline_path.to_path_buf(),
        reason,
    };

    let baseline_bytes = std::fs::read(baseline_path).map_err(|e| unreadable(e.to_string()))?;
    if sha256(actual) == sha256(&baseline_bytes) {
        let decoded = image::load_from_memory(actual)?;
        return Ok(Comparison::identical(decoded.as_bytes().len() as u64));
    }

    let actual_img = image::load_from_memory(actual)?;
    let baseline_img =
        image::load_from_memory(&baseline_bytes).map_err(|e| unreadable(e.to_string()))?;
    Ok(compare_images(&actual_img, &baseline_img, threshold))
}

/// Byte-wise comparison of two decoded images.
///
/// Differing color modes are both coerced to RGB first. Differing
/// dimensions are a 100% difference without looking at pixels.
pub fn compare_images(actual: &DynamicImage, baseline: &DynamicImage, threshold: f64) -> Comparison {
    if actual.dimensions() != baseline.dimensions() {
        debug!(
            "Dimensions differ: actual {:?} vs baseline {:?}",
            actual.dimensions(),
            baseline.dimensions()
        );
        return Comparison::hard_mismatch();
    }

    let (a, b): (Cow<'_, [u8]>, Cow<'_, [u8]>) = if actual.color() != baseline.color() {
        (
            Cow::Owned(actual.to_rgb8().into_raw()),
            Cow::Owned(baseline.to_rgb8().into_raw()),
        )
    } else {
        (Cow::Borrowed(actual.as_bytes()), Cow::Borrowed(baseline.as_bytes()))
    };

    let total_bytes = a.len() as u64;
    if total_bytes == 0 {
        return Comparison::identical(0);
    }

    let differing_bytes = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u64;
    let diff_percent = differing_bytes as f64 / total_bytes as f64 * 100.0;

    Comparison {
        matches: diff_percent <= threshold,
        diff_percent,
        differing_bytes,
        total_bytes,
    }
}

/// `home.png` -> `home-actual.png`; `home` -> `home-actual`.
///
/// The suffix goes before the last extension only, so `a.b.png` becomes
/// `a.b-actual.png`.
pub fn actual_artifact_name(name: &str) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}-actual.{}", stem, ext.to_string_lossy()),
        None => format!("{}-actual", stem),
    };
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.join(file_name).to_string_lossy().into_owned(),
        None => file_name,
    }
}

fn save_screenshot(bytes: &[u8], path: &Path) -> CheckResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
    use test_case::test_case;

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    #[test_case("homepage-desktop.png", "homepage-desktop-actual.png" ; "png")]
    #[test_case("component.nav.png", "component.nav-actual.png" ; "multiple dots")]
    #[test_case("snapshot", "snapshot-actual" ; "no extension")]
    #[test_case("desktop/home.png", "desktop/home-actual.png" ; "nested")]
    fn test_actual_artifact_name(name: &str, expected: &str) {
        assert_eq!(actual_artifact_name(name), expected);
    }

    #[test]
    fn test_identical_images_match() {
        let cmp = compare_images(&white(1280, 900), &white(1280, 900), 0.1);
        assert!(cmp.matches);
        assert_eq!(cmp.diff_percent, 0.0);
        assert_eq!(cmp.total_bytes, 1280 * 900 * 3);
    }

    #[test]
    fn test_dimension_mismatch_is_total() {
        let cmp = compare_images(&white(100, 100), &white(200, 200), 100.0);
        assert!(!cmp.matches);
        assert_eq!(cmp.diff_percent, 100.0);
        assert_eq!(cmp.differing_bytes, 0);
    }

    #[test]
    fn test_one_percent_banner_fails_default_threshold() {
        let baseline = white(1280, 900);
        let mut banner = RgbImage::from_pixel(1280, 900, Rgb([255, 255, 255]));
        // 9 full rows of black: 1280 * 9 * 3 bytes = 1% of the buffer
        for y in 0..9 {
            for x in 0..1280 {
                banner.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let cmp = compare_images(&DynamicImage::ImageRgb8(banner), &baseline, 0.1);
        assert!(!cmp.matches);
        assert!((cmp.diff_percent - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_mismatch_is_normalized() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            10,
            10,
            image::Rgba([255, 255, 255, 255]),
        ));
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([255])));
        let cmp = compare_images(&rgba, &gray, 0.1);
        assert!(cmp.matches);
        assert_eq!(cmp.total_bytes, 10 * 10 * 3);
    }

    #[test]
    fn test_missing_baseline_compares_as_total_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cmp = compare_screenshots(b"irrelevant", &dir.path().join("none.png"), 0.1).unwrap();
        assert!(!cmp.matches);
        assert_eq!(cmp.diff_percent, 100.0);
    }

    #[test_case(Some("1"), true)]
    #[test_case(Some("TRUE"), true)]
    #[test_case(Some("yes"), true)]
    #[test_case(Some("0"), false)]
    #[test_case(Some(""), false)]
    #[test_case(None, false)]
    fn test_env_requests_update(value: Option<&str>, expected: bool) {
        assert_eq!(env_requests_update(value), expected);
    }
}
