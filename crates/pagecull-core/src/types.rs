// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for pagecull: detection modes, per-page decisions, ink
// measurements, rewrite and stamping results.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{RenderDebugRecord, StructuralDebugRecord};
use crate::error::PagecullError;

// -- Modes and policies -------------------------------------------------------

/// Which detector(s) decide whether a page is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Content-stream interpretation only.
    Structural,
    /// Rasterised ink sampling only.
    Render,
    /// Either detector may declare a page empty.
    #[default]
    Both,
}

impl DetectionMode {
    /// Whether this mode needs the rasterising detector.
    pub fn needs_render(&self) -> bool {
        matches!(self, Self::Render | Self::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Render => "render",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background model used to classify rendered pixels.
///
/// Only a white background is supported; any other name is rejected when
/// parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackgroundMode {
    #[default]
    White,
}

impl FromStr for BackgroundMode {
    type Err = PagecullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            other => Err(PagecullError::Config(format!(
                "unsupported background mode '{other}' (only 'white' is implemented)"
            ))),
        }
    }
}

impl TryFrom<String> for BackgroundMode {
    type Error = PagecullError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackgroundMode> for String {
    fn from(_: BackgroundMode) -> Self {
        "white".to_string()
    }
}

/// What happens to outline entries when pages are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BookmarkPolicy {
    /// Remap entries whose target survives, drop the rest.
    #[default]
    Drop,
}

impl FromStr for BookmarkPolicy {
    type Err = PagecullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            other => Err(PagecullError::Config(format!(
                "unsupported bookmark policy '{other}' (only 'drop' is supported)"
            ))),
        }
    }
}

impl TryFrom<String> for BookmarkPolicy {
    type Error = PagecullError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookmarkPolicy> for String {
    fn from(_: BookmarkPolicy) -> Self {
        "drop".to_string()
    }
}

/// Region of a rendered page that is inspected for ink.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRegion {
    #[default]
    FullPage,
    /// Inset from each edge, in inches.
    Margins {
        top: f64,
        right: f64,
        bottom: f64,
        left: f64,
    },
}

impl SampleRegion {
    /// Margins as `[top, right, bottom, left]`; all zero for the full page.
    pub fn margins_inches(&self) -> [f64; 4] {
        match *self {
            Self::FullPage => [0.0; 4],
            Self::Margins {
                top,
                right,
                bottom,
                left,
            } => [top, right, bottom, left],
        }
    }
}

/// The three standard PDF faces usable for page-number labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StampFont {
    #[default]
    Helvetica,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
    Courier,
}

impl StampFont {
    /// `/BaseFont` name of the standard Type1 face.
    pub fn base_font(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }

    /// Average glyph advance as a fraction of the font size, used to centre
    /// labels without loading font metrics.
    pub fn average_glyph_width(&self) -> f64 {
        match self {
            Self::Helvetica => 0.56,
            Self::TimesRoman => 0.50,
            Self::Courier => 0.60,
        }
    }
}

// -- Page decisions -----------------------------------------------------------

/// Why a detector (or the combiner) reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    // Structural detector.
    HasXobject,
    HasAnnotations,
    NoContents,
    ContentsWhitespaceOnly,
    VisibleText,
    /// A path or shading painted with non-zero opacity.
    VisiblePaint,
    XobjectPaint,
    InlineImage,
    OnlyInvisiblePaint,
    NoPaintOps,
    UnknownStructure,
    // Render detector.
    InkBelowThreshold,
    InkAboveThreshold,
    RenderFailed,
    // Combiner.
    StructuralEmpty,
    RenderEmpty,
    BothEmpty,
    NonEmpty,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasXobject => "has_xobject",
            Self::HasAnnotations => "has_annotations",
            Self::NoContents => "no_contents",
            Self::ContentsWhitespaceOnly => "contents_whitespace_only",
            Self::VisibleText => "visible_text",
            Self::VisiblePaint => "visible_paint",
            Self::XobjectPaint => "xobject_paint",
            Self::InlineImage => "inline_image",
            Self::OnlyInvisiblePaint => "only_invisible_paint",
            Self::NoPaintOps => "no_paint_ops",
            Self::UnknownStructure => "unknown_structure",
            Self::InkBelowThreshold => "ink_below_threshold",
            Self::InkAboveThreshold => "ink_above_threshold",
            Self::RenderFailed => "render_failed",
            Self::StructuralEmpty => "structural_empty",
            Self::RenderEmpty => "render_empty",
            Self::BothEmpty => "both_empty",
            Self::NonEmpty => "non_empty",
        }
    }

    /// Reasons meaning "nothing is drawn at all", as opposed to "drawn but
    /// invisible".
    pub fn is_paintless(&self) -> bool {
        matches!(
            self,
            Self::NoContents | Self::ContentsWhitespaceOnly | Self::NoPaintOps
        )
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector's verdict for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDecision {
    /// 0-based index in source order.
    pub page_index: usize,
    pub is_empty: bool,
    pub reason: DecisionReason,
    pub details: DecisionDetails,
}

/// Diagnostic payload attached to a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionDetails {
    Structural(StructuralDetails),
    Render(RenderDetails),
    Combined(Box<CombinedDetails>),
}

impl DecisionDetails {
    pub fn as_structural(&self) -> Option<&StructuralDetails> {
        match self {
            Self::Structural(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_render(&self) -> Option<&RenderDetails> {
        match self {
            Self::Render(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_combined(&self) -> Option<&CombinedDetails> {
        match self {
            Self::Combined(details) => Some(details),
            _ => None,
        }
    }
}

/// Fixed diagnostic fields recorded by the structural interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralDetails {
    pub fonts_present: bool,
    pub xobjects_present: bool,
    pub annotations_count: usize,
    pub has_contents: bool,
    /// Distinct paint operators seen, in first-seen order.
    pub paint_ops_found: Vec<String>,
    /// Distinct state operators seen, in first-seen order.
    pub state_ops_found: Vec<String>,
    pub invisible_text_events_count: usize,
    pub invisible_path_events_count: usize,
    pub last_seen_tr: Option<i64>,
    pub last_seen_font_size: Option<f32>,
    pub last_seen_fill_opacity: f32,
    pub last_seen_stroke_opacity: f32,
    pub last_seen_extgstate: Option<String>,
    /// Free-form observations (stack underflow, unresolved names, errors).
    pub notes: Vec<String>,
}

impl Default for StructuralDetails {
    fn default() -> Self {
        Self {
            fonts_present: false,
            xobjects_present: false,
            annotations_count: 0,
            has_contents: false,
            paint_ops_found: Vec::new(),
            state_ops_found: Vec::new(),
            invisible_text_events_count: 0,
            invisible_path_events_count: 0,
            last_seen_tr: None,
            last_seen_font_size: None,
            last_seen_fill_opacity: 1.0,
            last_seen_stroke_opacity: 1.0,
            last_seen_extgstate: None,
            notes: Vec::new(),
        }
    }
}

/// Diagnostic fields recorded by the render detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDetails {
    pub dpi: u32,
    pub scale: f32,
    pub background: BackgroundMode,
    pub sample_margin_inches: [f64; 4],
    pub measurement: Option<InkMeasurement>,
    pub error: Option<String>,
}

/// Both underlying verdicts behind a combined decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedDetails {
    pub mode: DetectionMode,
    pub structural_is_empty: bool,
    pub structural_reason: DecisionReason,
    pub structural: DecisionDetails,
    pub render_is_empty: Option<bool>,
    pub render_reason: Option<DecisionReason>,
    pub render: Option<DecisionDetails>,
}

// -- Ink measurement ----------------------------------------------------------

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() == 0
    }
}

/// Result of classifying the pixels of one sample box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InkMeasurement {
    pub sample_box_px: PixelBox,
    pub total_pixels_sampled: u64,
    pub nonwhite_pixel_count: u64,
    pub ink_ratio: f64,
    /// Per-channel RGB minimum over the box; `None` for an empty box.
    pub min_rgb: Option<[u8; 3]>,
    pub max_rgb: Option<[u8; 3]>,
}

// -- Rewrite and stamping -----------------------------------------------------

/// Outcome of rewriting one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewriteResult {
    pub output_path: PathBuf,
    pub pages_output: usize,
    pub outlines_copied: usize,
    pub outlines_dropped: usize,
    pub stamp_decisions: Vec<StampDecision>,
    pub warnings: Vec<String>,
}

impl RewriteResult {
    pub fn stamped_pages(&self) -> usize {
        self.stamp_decisions
            .iter()
            .filter(|d| d.action != StampAction::SkippedGuardrail)
            .count()
    }

    pub fn forced_pages(&self) -> usize {
        self.stamp_decisions
            .iter()
            .filter(|d| d.action == StampAction::StampedForced)
            .count()
    }

    pub fn skipped_pages(&self) -> usize {
        self.stamp_decisions
            .iter()
            .filter(|d| d.action == StampAction::SkippedGuardrail)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampAction {
    Stamped,
    StampedForced,
    SkippedGuardrail,
}

/// Why the stamper did (or did not) touch a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampReason {
    Stamped,
    StampedForced,
    InvalidSampleArea,
    InkThresholdExceeded,
    RenderFailed,
}

/// Audit record for one retained page considered by the stamper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampDecision {
    pub output_page_index: usize,
    pub output_page_number: usize,
    pub action: StampAction,
    pub reason: StampReason,
    pub forced: bool,
    pub box_ink_ratio: f64,
    pub cover_color_rgb: [u8; 3],
    pub sample_box_px: PixelBox,
    /// Configured box `(x, y, width, height)` in inches.
    pub box_in: [f64; 4],
    /// Same box in PDF points.
    pub box_pt: [f64; 4],
    pub stamped_label: String,
}

// -- Per-file results ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Pages were removed and the output written.
    Edited,
    /// Nothing removed, but a copy was written on request.
    Copied,
    Unchanged,
    DryRun,
    Failed,
}

/// Counters summarising the decisions for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    pub empty_pages: usize,
    pub non_empty_pages: usize,
    pub structural_empty_pages: usize,
    pub render_empty_pages: usize,
    pub both_empty_pages: usize,
    pub only_invisible_paint_pages: usize,
    pub no_paint_ops_pages: usize,
    pub visible_pages: usize,
    /// Count per final decision reason.
    pub by_reason: std::collections::BTreeMap<DecisionReason, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timings {
    pub detection_seconds: Option<f64>,
    pub write_seconds: Option<f64>,
    pub total_seconds: f64,
}

/// Everything the reporting layer needs to know about one processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub status: FileStatus,
    pub pages_original: usize,
    pub pages_removed: usize,
    pub pages_output: usize,
    pub decisions_summary: DecisionSummary,
    pub page_decisions: Vec<PageDecision>,
    pub stamping_enabled: bool,
    pub stamping_applied_pages: usize,
    pub stamping_forced_pages: usize,
    pub stamping_skipped_pages: usize,
    pub stamp_decisions: Vec<StampDecision>,
    pub structural_debug: Vec<StructuralDebugRecord>,
    pub render_debug: Vec<RenderDebugRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub timings: Timings,
}

impl FileResult {
    /// A result for a file that failed before any decision was made.
    pub fn failed(input_path: PathBuf, error: String) -> Self {
        Self {
            input_path,
            output_path: None,
            status: FileStatus::Failed,
            pages_original: 0,
            pages_removed: 0,
            pages_output: 0,
            decisions_summary: DecisionSummary::default(),
            page_decisions: Vec::new(),
            stamping_enabled: false,
            stamping_applied_pages: 0,
            stamping_forced_pages: 0,
            stamping_skipped_pages: 0,
            stamp_decisions: Vec::new(),
            structural_debug: Vec::new(),
            render_debug: Vec::new(),
            warnings: Vec::new(),
            errors: vec![error],
            timings: Timings::default(),
        }
    }
}
