// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagecull-document — Empty-page detection and PDF rewriting.
//
// Provides typed PDF reading and content-stream parsing, structural and
// render-based emptiness detection, the page rewriter with outline
// remapping, the guarded page-number stamper, and the per-file pipeline.

pub mod detect;
pub mod pdf;
pub mod process;
pub mod raster;
pub mod rewrite;
pub mod stamp;

#[cfg(test)]
mod fixtures;

// Re-export the primary entry points so callers can use `pagecull_document::process_pdf` etc.
pub use detect::{RenderDetector, StructuralDetector, combine, summarize};
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use process::process_pdf;
pub use raster::{PdfiumRasterizer, RasterDocument, Rasterizer, RenderSource};
pub use rewrite::{PageRewriter, edited_output_path, is_edited_output};
pub use stamp::Stamper;
