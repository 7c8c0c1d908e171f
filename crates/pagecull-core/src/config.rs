// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PagecullError, Result};
use crate::types::{BackgroundMode, BookmarkPolicy, DetectionMode, SampleRegion, StampFont};

/// Settings applied to every file in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Which detector(s) decide emptiness.
    pub mode: DetectionMode,
    /// Rasterisation resolution for the render detector and the stamper.
    pub render_dpi: u32,
    /// Pages whose ink ratio is below this fraction count as empty.
    pub ink_threshold: f64,
    /// A pixel is background when every RGB channel is at least this value.
    pub white_threshold: u8,
    pub background: BackgroundMode,
    /// `[top, right, bottom, left]` inset in inches; `None` samples the full page.
    pub render_sample_margin: Option<[f64; 4]>,
    /// When false, any annotation keeps a page.
    pub treat_annotations_as_empty: bool,
    /// Write a copy even when no page is removed.
    pub write_when_unchanged: bool,
    /// Decide only; never write output.
    pub dry_run: bool,
    pub debug_structural: bool,
    pub debug_render: bool,
    pub bookmark_policy: BookmarkPolicy,
    /// Page-number re-stamping; disabled when absent.
    pub stamp: Option<StampSettings>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Both,
            render_dpi: 72,
            ink_threshold: 0.0005,
            white_threshold: 250,
            background: BackgroundMode::White,
            render_sample_margin: None,
            treat_annotations_as_empty: true,
            write_when_unchanged: false,
            dry_run: false,
            debug_structural: false,
            debug_render: false,
            bookmark_policy: BookmarkPolicy::Drop,
            stamp: None,
        }
    }
}

impl RunConfig {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their documented ranges.
    pub fn validate(&self) -> Result<()> {
        if self.render_dpi == 0 {
            return Err(PagecullError::Config("render_dpi must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.ink_threshold) {
            return Err(PagecullError::Config(format!(
                "ink_threshold must be in [0, 1), got {}",
                self.ink_threshold
            )));
        }
        if let Some(margins) = self.render_sample_margin {
            if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
                return Err(PagecullError::Config(
                    "render_sample_margin values must be non-negative inches".into(),
                ));
            }
        }
        if let Some(stamp) = &self.stamp {
            stamp.validate()?;
        }
        Ok(())
    }

    pub fn sample_region(&self) -> SampleRegion {
        match self.render_sample_margin {
            None => SampleRegion::FullPage,
            Some([top, right, bottom, left]) => SampleRegion::Margins {
                top,
                right,
                bottom,
                left,
            },
        }
    }

    /// Scale factor applied to the 72-point PDF user space.
    pub fn render_scale(&self) -> f32 {
        self.render_dpi as f32 / 72.0
    }
}

/// Page-number re-stamping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampSettings {
    /// `(x, y, width, height)` in inches from the bottom-left corner.
    pub box_in: Option<[f64; 4]>,
    pub font: StampFont,
    pub size: f64,
    /// Label template; `{page}`, `{roman}` and `{ROMAN}` are substituted.
    pub format: String,
    /// Stamp even when the box already carries ink.
    pub force: bool,
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            box_in: None,
            font: StampFont::Helvetica,
            size: 10.0,
            format: "{page}".to_string(),
            force: false,
        }
    }
}

impl StampSettings {
    pub fn validate(&self) -> Result<()> {
        let Some(box_in) = self.box_in else {
            return Err(PagecullError::Config(
                "stamping requires a box (x, y, width, height) in inches".into(),
            ));
        };
        if box_in.iter().any(|v| !v.is_finite()) {
            return Err(PagecullError::Config("stamp box must be finite".into()));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(PagecullError::Config(format!(
                "stamp font size must be positive, got {}",
                self.size
            )));
        }
        Ok(())
    }

    /// The stamp box, or a configuration error when it is missing.
    pub fn required_box(&self) -> Result<[f64; 4]> {
        self.box_in.ok_or_else(|| {
            PagecullError::Config("stamping requires a box (x, y, width, height) in inches".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, DetectionMode::Both);
        assert_eq!(config.render_scale(), 1.0);
        assert_eq!(config.sample_region(), SampleRegion::FullPage);
    }

    #[test]
    fn ink_threshold_must_be_fraction() {
        let config = RunConfig {
            ink_threshold: 1.0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(PagecullError::Config(_))));
    }

    #[test]
    fn stamping_without_box_is_rejected() {
        let config = RunConfig {
            stamp: Some(StampSettings::default()),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"mode":"structural","render_sample_margin":[1,0.5,1,0.5]}"#)
                .unwrap();
        assert_eq!(config.mode, DetectionMode::Structural);
        assert_eq!(config.white_threshold, 250);
        assert_eq!(
            config.sample_region(),
            SampleRegion::Margins {
                top: 1.0,
                right: 0.5,
                bottom: 1.0,
                left: 0.5
            }
        );
    }

    #[test]
    fn unknown_background_fails_to_deserialize() {
        let parsed = serde_json::from_str::<RunConfig>(r#"{"background":"black"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load_or_default(&dir.path().join("pagecull.json")).unwrap();
        assert_eq!(config, RunConfig::default());
    }
}
