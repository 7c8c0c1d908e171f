// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render-based emptiness detection: rasterise each page and compare the
// share of non-background pixels in the sample region against a threshold.

use pagecull_core::config::RunConfig;
use pagecull_core::error::Result;
use pagecull_core::{
    BackgroundMode, DecisionDetails, DecisionReason, PageDecision, PixelBox, RenderDebugRecord,
    RenderDetails, SampleRegion,
};
use tracing::{debug, info, instrument, warn};

use crate::raster::{InkSampler, Rasterizer, RenderSource, pixel_box_from_margins};

/// Decisions (and optional debug records) for every page of one document.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub decisions: Vec<PageDecision>,
    pub debug_records: Vec<RenderDebugRecord>,
}

pub struct RenderDetector<'r> {
    rasterizer: &'r dyn Rasterizer,
    dpi: u32,
    ink_threshold: f64,
    sampler: InkSampler,
    region: SampleRegion,
    background: BackgroundMode,
    collect_debug: bool,
}

impl<'r> RenderDetector<'r> {
    pub fn new(rasterizer: &'r dyn Rasterizer, config: &RunConfig) -> Self {
        Self {
            rasterizer,
            dpi: config.render_dpi,
            ink_threshold: config.ink_threshold,
            sampler: InkSampler::new(config.white_threshold),
            region: config.sample_region(),
            background: config.background,
            collect_debug: config.debug_render,
        }
    }

    fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }

    /// Render every page of `source` and classify it.
    ///
    /// Failing to open the document is an error for the whole file; a page
    /// that fails to render is kept with reason `render_failed`.
    #[instrument(skip_all, fields(dpi = self.dpi))]
    pub fn detect(&self, source: RenderSource<'_>) -> Result<RenderReport> {
        let document = self.rasterizer.open(source)?;
        let page_count = document.page_count();
        let scale = self.scale();
        let margins = self.region.margins_inches();
        let mut report = RenderReport::default();

        for index in 0..page_count {
            let mut details = RenderDetails {
                dpi: self.dpi,
                scale,
                background: self.background,
                sample_margin_inches: margins,
                measurement: None,
                error: None,
            };

            let (is_empty, reason, size) = match document.render_page(index, scale) {
                Ok(image) => {
                    let sample = pixel_box_from_margins(image.width(), image.height(), margins, self.dpi);
                    let measurement = self.sampler.measure(&image, sample);
                    let is_empty = measurement.ink_ratio < self.ink_threshold;
                    debug!(
                        page = index,
                        ink_ratio = measurement.ink_ratio,
                        sampled = measurement.total_pixels_sampled,
                        "Ink measured"
                    );
                    details.measurement = Some(measurement);
                    let reason = if is_empty {
                        DecisionReason::InkBelowThreshold
                    } else {
                        DecisionReason::InkAboveThreshold
                    };
                    (is_empty, reason, (image.width(), image.height()))
                }
                Err(err) => {
                    warn!(page = index, %err, "Page failed to render; keeping page");
                    details.error = Some(err.to_string());
                    (false, DecisionReason::RenderFailed, (0, 0))
                }
            };

            if self.collect_debug {
                report.debug_records.push(RenderDebugRecord {
                    page_index: index,
                    dpi: self.dpi,
                    scale,
                    width_px: size.0,
                    height_px: size.1,
                    sample_margin_inches: margins,
                    sample_box_px: details
                        .measurement
                        .as_ref()
                        .map_or(PixelBox::default(), |m| m.sample_box_px),
                    is_empty,
                    reason,
                    measurement: details.measurement.clone(),
                    error: details.error.clone(),
                });
            }
            report.decisions.push(PageDecision {
                page_index: index,
                is_empty,
                reason,
                details: DecisionDetails::Render(details),
            });
        }

        info!(
            pages = page_count,
            empty = report.decisions.iter().filter(|d| d.is_empty).count(),
            "Render detection complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixturePage, PdfFixture, SketchRasterizer};

    fn fixture_bytes() -> Vec<u8> {
        PdfFixture::new()
            .page(FixturePage::text("cover"))
            .page(FixturePage::blank())
            .page(FixturePage::raw(b"BT /F1 12 Tf 3 Tr 72 72 Td (ghost) Tj ET"))
            .to_bytes()
    }

    #[test]
    fn ink_decides_emptiness() {
        let rasterizer = SketchRasterizer::default();
        let config = RunConfig::default();
        let bytes = fixture_bytes();
        let report = RenderDetector::new(&rasterizer, &config)
            .detect(RenderSource::Bytes(&bytes))
            .unwrap();

        let verdicts: Vec<_> = report
            .decisions
            .iter()
            .map(|d| (d.is_empty, d.reason))
            .collect();
        assert_eq!(
            verdicts,
            vec![
                (false, DecisionReason::InkAboveThreshold),
                (true, DecisionReason::InkBelowThreshold),
                (true, DecisionReason::InkBelowThreshold),
            ]
        );
        let details = report.decisions[0].details.as_render().unwrap();
        assert_eq!(details.dpi, 72);
        assert!(details.measurement.as_ref().unwrap().ink_ratio > 0.0);
        assert!(report.debug_records.is_empty());
    }

    #[test]
    fn margins_can_exclude_the_ink() {
        // The fixture text sits at y = 700pt, i.e. within the top 1.5 inches.
        let rasterizer = SketchRasterizer::default();
        let config = RunConfig {
            render_sample_margin: Some([1.5, 0.0, 0.0, 0.0]),
            debug_render: true,
            ..RunConfig::default()
        };
        let bytes = PdfFixture::new().page(FixturePage::text("header")).to_bytes();
        let report = RenderDetector::new(&rasterizer, &config)
            .detect(RenderSource::Bytes(&bytes))
            .unwrap();

        assert!(report.decisions[0].is_empty);
        let record = &report.debug_records[0];
        assert_eq!(record.sample_margin_inches, [1.5, 0.0, 0.0, 0.0]);
        assert_eq!(record.sample_box_px.y0, 108);
        assert_eq!((record.width_px, record.height_px), (612, 792));
    }

    #[test]
    fn page_failures_are_kept_and_do_not_abort() {
        let rasterizer = SketchRasterizer {
            failing_pages: vec![1],
            ..SketchRasterizer::default()
        };
        let config = RunConfig::default();
        let bytes = fixture_bytes();
        let report = RenderDetector::new(&rasterizer, &config)
            .detect(RenderSource::Bytes(&bytes))
            .unwrap();

        assert_eq!(report.decisions.len(), 3);
        assert_eq!(report.decisions[1].reason, DecisionReason::RenderFailed);
        assert!(!report.decisions[1].is_empty);
        assert!(report.decisions[1].details.as_render().unwrap().error.is_some());
        assert!(report.decisions[2].is_empty);
    }

    #[test]
    fn open_failure_is_a_file_error() {
        let rasterizer = SketchRasterizer {
            fail_open: true,
            ..SketchRasterizer::default()
        };
        let config = RunConfig::default();
        let bytes = fixture_bytes();
        assert!(
            RenderDetector::new(&rasterizer, &config)
                .detect(RenderSource::Bytes(&bytes))
                .is_err()
        );
    }
}
