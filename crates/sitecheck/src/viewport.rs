//! Viewport catalog used by responsive and visual checks

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const DESKTOP_LARGE: Viewport = Viewport::new(1400, 900);
    pub const DESKTOP: Viewport = Viewport::new(1200, 800);
    pub const TABLET_LANDSCAPE: Viewport = Viewport::new(1000, 700);
    pub const TABLET: Viewport = Viewport::new(800, 1024);
    pub const MOBILE: Viewport = Viewport::new(500, 844);
    pub const MOBILE_SMALL: Viewport = Viewport::new(350, 667);

    /// Size every browser context starts with.
    pub const CONTEXT_DEFAULT: Viewport = Viewport::new(1280, 720);

    /// Named breakpoints exercised by the responsive suite.
    pub fn catalog() -> [(&'static str, Viewport); 6] {
        [
            ("desktop_large", Self::DESKTOP_LARGE),
            ("desktop", Self::DESKTOP),
            ("tablet_landscape", Self::TABLET_LANDSCAPE),
            ("tablet", Self::TABLET),
            ("mobile", Self::MOBILE),
            ("mobile_small", Self::MOBILE_SMALL),
        ]
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Viewport a visual baseline belongs to.
///
/// Baselines are keyed by class: the class name is part of every snapshot
/// file name, so a desktop capture is never compared against a mobile one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportClass {
    Desktop,
    Mobile,
}

impl ViewportClass {
    pub fn viewport(&self) -> Viewport {
        match self {
            ViewportClass::Desktop => Viewport::new(1280, 720),
            ViewportClass::Mobile => Viewport::new(375, 667),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportClass::Desktop => "desktop",
            ViewportClass::Mobile => "mobile",
        }
    }

    pub fn all() -> [ViewportClass; 2] {
        [ViewportClass::Desktop, ViewportClass::Mobile]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visual_classes_are_distinct() {
        assert_eq!(ViewportClass::Desktop.viewport(), Viewport::new(1280, 720));
        assert_eq!(ViewportClass::Mobile.viewport(), Viewport::new(375, 667));
        assert_ne!(ViewportClass::Desktop.as_str(), ViewportClass::Mobile.as_str());
    }

    #[test]
    fn test_catalog_is_ordered_widest_first() {
        let widths: Vec<u32> = Viewport::catalog().iter().map(|(_, v)| v.width).collect();
        let mut sorted = widths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(widths, sorted);
    }
}
