// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module — the rendering capability used by the render detector and
// the page-number stamper, plus pixel sampling over rendered bitmaps.

pub mod ink;
pub mod pdfium;

use std::path::Path;

use image::RgbaImage;
use pagecull_core::error::Result;

pub use ink::{InkSampler, median_rgb, pixel_box_from_margins, pixel_box_from_rect};
pub use pdfium::PdfiumRasterizer;

/// Where a renderer should read a document from.
#[derive(Debug, Clone, Copy)]
pub enum RenderSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

/// A backend able to open PDF documents for rasterisation.
///
/// Passed around as `Option<&dyn Rasterizer>`: detection and stamping degrade
/// or fail explicitly when no backend is available.
pub trait Rasterizer {
    /// Open a document. Failure here is a file-level error.
    fn open<'a>(&'a self, source: RenderSource<'a>) -> Result<Box<dyn RasterDocument + 'a>>;
}

/// An opened document. Resources are released on drop.
pub trait RasterDocument {
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based) at `scale` pixels per PDF point.
    fn render_page(&self, index: usize, scale: f32) -> Result<RgbaImage>;
}
