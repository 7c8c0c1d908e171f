// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium-backed rasterizer (dynamically linked through `pdfium-render`).

use image::RgbaImage;
use pagecull_core::error::{PagecullError, Result};
use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium};
use tracing::{debug, info, instrument};

use super::{RasterDocument, Rasterizer, RenderSource};

/// Renders pages with a bound PDFium library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to PDFium.
    ///
    /// Searches for the shared library in:
    /// 1. The current directory
    /// 2. `vendor/pdfium/lib/`
    /// 3. System library paths
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "./vendor/pdfium/lib/",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| {
                PagecullError::RendererUnavailable(format!(
                    "failed to load the PDFium library: {err:?}"
                ))
            })?;

        info!("PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl Rasterizer for PdfiumRasterizer {
    #[instrument(skip_all)]
    fn open<'a>(&'a self, source: RenderSource<'a>) -> Result<Box<dyn RasterDocument + 'a>> {
        let document = match source {
            RenderSource::Path(path) => self.pdfium.load_pdf_from_file(path, None),
            RenderSource::Bytes(bytes) => self.pdfium.load_pdf_from_byte_slice(bytes, None),
        }
        .map_err(|err| {
            PagecullError::RendererUnavailable(format!("renderer could not open document: {err}"))
        })?;

        debug!(pages = document.pages().len(), "Document opened for rendering");
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RgbaImage> {
        let render_error = |message: String| PagecullError::Render {
            page: index,
            message,
        };

        let page_index =
            u16::try_from(index).map_err(|_| render_error("page index out of range".into()))?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|err| render_error(err.to_string()))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| render_error(err.to_string()))?;

        Ok(bitmap.as_image().to_rgba8())
    }
}
