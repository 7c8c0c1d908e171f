// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optional per-page debug records collected when structural or render
// debugging is enabled. They never influence a decision.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{DecisionReason, InkMeasurement, PixelBox, StructuralDetails};

/// Short summary of one content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentPreview {
    pub length: usize,
    /// Lowercase hex SHA-256 of the decoded bytes.
    pub sha256: String,
    /// Leading bytes, lossily decoded.
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralDebugRecord {
    pub page_index: usize,
    pub is_empty: bool,
    pub reason: DecisionReason,
    pub resource_keys: Vec<String>,
    pub font_names: Vec<String>,
    pub xobject_names: Vec<String>,
    pub extgstate_names: Vec<String>,
    /// Operator frequency histogram.
    pub operator_counts: BTreeMap<String, usize>,
    pub content_streams: Vec<ContentPreview>,
    pub details: StructuralDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDebugRecord {
    pub page_index: usize,
    pub dpi: u32,
    pub scale: f32,
    pub width_px: u32,
    pub height_px: u32,
    pub sample_margin_inches: [f64; 4],
    pub sample_box_px: PixelBox,
    pub is_empty: bool,
    pub reason: DecisionReason,
    pub measurement: Option<InkMeasurement>,
    pub error: Option<String>,
}
