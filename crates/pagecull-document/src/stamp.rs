// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-number stamper — covers a configured box on each retained page with
// its own median colour and draws the corrected page label, unless the box
// already carries ink.

use lopdf::content::{Content, Operation};
use lopdf::{Object, dictionary};
use pagecull_core::config::{RunConfig, StampSettings};
use pagecull_core::error::{PagecullError, Result};
use pagecull_core::{PixelBox, StampAction, StampDecision, StampReason};
use tracing::{debug, info, instrument, warn};

use crate::pdf::strings::encode_text;
use crate::pdf::writer::PdfWriter;
use crate::raster::{InkSampler, Rasterizer, RenderSource, median_rgb, pixel_box_from_rect};

const WHITE: [u8; 3] = [255, 255, 255];

// -- Labels -------------------------------------------------------------------

const NUMERALS: [(i64, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Uppercase Roman numeral for a positive integer.
pub fn to_roman(value: i64) -> Result<String> {
    if value <= 0 {
        return Err(PagecullError::Stamp(format!(
            "Roman numerals require a positive integer, got {value}"
        )));
    }
    let mut remaining = value;
    let mut out = String::new();
    for (number, symbol) in NUMERALS {
        while remaining >= number {
            out.push_str(symbol);
            remaining -= number;
        }
    }
    Ok(out)
}

/// Expand `{ROMAN}`, `{roman}` and `{page}` in `template`.
pub fn format_page_label(template: &str, page_number: usize) -> Result<String> {
    let mut label = template.to_string();
    if label.contains("{ROMAN}") || label.contains("{roman}") {
        let number = i64::try_from(page_number)
            .map_err(|_| PagecullError::Stamp(format!("page number {page_number} too large")))?;
        let roman = to_roman(number)?;
        label = label
            .replace("{ROMAN}", &roman)
            .replace("{roman}", &roman.to_lowercase());
    }
    Ok(label.replace("{page}", &page_number.to_string()))
}

// -- Stamper ------------------------------------------------------------------

/// Stamp decisions plus the warnings raised while producing them.
#[derive(Debug, Clone, Default)]
pub struct StampOutcome {
    pub decisions: Vec<StampDecision>,
    pub warnings: Vec<String>,
}

pub struct Stamper<'r> {
    rasterizer: &'r dyn Rasterizer,
    settings: StampSettings,
    box_in: [f64; 4],
    dpi: u32,
    sampler: InkSampler,
    ink_threshold: f64,
}

impl<'r> Stamper<'r> {
    /// Fails when the settings carry no usable box.
    pub fn new(rasterizer: &'r dyn Rasterizer, settings: &StampSettings, config: &RunConfig) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            rasterizer,
            box_in: settings.required_box()?,
            settings: settings.clone(),
            dpi: config.render_dpi,
            sampler: InkSampler::new(config.white_threshold),
            ink_threshold: config.ink_threshold,
        })
    }

    /// Consider every page of `writer` in order, stamping those that pass
    /// the guardrail. Returns one decision per page.
    #[instrument(skip_all, fields(pages = writer.page_count(), force = self.settings.force))]
    pub fn stamp(&self, writer: &mut PdfWriter) -> Result<StampOutcome> {
        let mut outcome = StampOutcome::default();
        let mut font_id = None;

        for index in 0..writer.page_count() {
            let number = index + 1;
            let label = format_page_label(&self.settings.format, number)?;
            let [llx, lly, _, _] = writer.page_box(index)?;
            let [x, y, w, h] = self.box_in;
            let box_pt = [llx + x * 72.0, lly + y * 72.0, w * 72.0, h * 72.0];

            let mut decision = StampDecision {
                output_page_index: index,
                output_page_number: number,
                action: StampAction::SkippedGuardrail,
                reason: StampReason::RenderFailed,
                forced: false,
                box_ink_ratio: 0.0,
                cover_color_rgb: WHITE,
                sample_box_px: PixelBox::default(),
                box_in: self.box_in,
                box_pt,
                stamped_label: label.clone(),
            };

            let sample = match self.sample(writer, index) {
                Ok(sample) => sample,
                Err(err) => {
                    warn!(page = number, %err, "Cannot render page for stamping; leaving it untouched");
                    outcome
                        .warnings
                        .push(format!("Page-number stamping skipped output page {number}: {err}"));
                    outcome.decisions.push(decision);
                    continue;
                }
            };
            decision.box_ink_ratio = sample.ink_ratio;
            decision.cover_color_rgb = sample.cover;
            decision.sample_box_px = sample.sample_box;

            if sample.sample_box.is_degenerate() {
                decision.reason = StampReason::InvalidSampleArea;
            } else if sample.ink_ratio > self.ink_threshold && !self.settings.force {
                decision.reason = StampReason::InkThresholdExceeded;
            } else {
                let font_id = *font_id.get_or_insert_with(|| {
                    writer.add_object(dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => self.settings.font.base_font(),
                        "Encoding" => "WinAnsiEncoding",
                    })
                });
                let font_name = writer.register_page_font(index, font_id)?;
                let overlay = self.overlay(&font_name, box_pt, &label, sample.cover)?;
                writer.append_overlay(index, overlay)?;

                let forced = self.settings.force;
                decision.forced = forced;
                (decision.action, decision.reason) = if forced {
                    (StampAction::StampedForced, StampReason::StampedForced)
                } else {
                    (StampAction::Stamped, StampReason::Stamped)
                };
            }

            debug!(
                page = number,
                action = ?decision.action,
                ink_ratio = decision.box_ink_ratio,
                "Stamp decision"
            );
            outcome.decisions.push(decision);
        }

        info!(
            stamped = outcome
                .decisions
                .iter()
                .filter(|d| d.action != StampAction::SkippedGuardrail)
                .count(),
            considered = outcome.decisions.len(),
            "Page numbers stamped"
        );
        Ok(outcome)
    }

    fn sample(&self, writer: &PdfWriter, index: usize) -> Result<BoxSample> {
        let isolated = writer.single_page_pdf(index)?;
        let document = self.rasterizer.open(RenderSource::Bytes(&isolated))?;
        let image = document.render_page(0, self.dpi as f32 / 72.0)?;

        let sample_box = pixel_box_from_rect(image.width(), image.height(), self.box_in, self.dpi);
        let measurement = self.sampler.measure(&image, sample_box);
        Ok(BoxSample {
            sample_box,
            ink_ratio: measurement.ink_ratio,
            cover: median_rgb(&image, sample_box).unwrap_or(WHITE),
        })
    }

    fn overlay(&self, font_name: &str, box_pt: [f64; 4], label: &str, cover: [u8; 3]) -> Result<Vec<u8>> {
        let [x, y, w, h] = box_pt;
        let size = self.settings.size;
        let text_width = label.chars().count() as f64 * self.settings.font.average_glyph_width() * size;
        let text_x = x + w / 2.0 - text_width / 2.0;
        let text_y = y + h / 2.0 - size * 0.35;

        let real = |value: f64| Object::Real(value as f32);
        let color = |rgb: [u8; 3]| rgb.iter().map(|c| real(f64::from(*c) / 255.0)).collect::<Vec<_>>();

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("rg", color(cover)),
                Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), real(size)]),
                Operation::new("rg", color(text_color(cover))),
                Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        real(text_x),
                        real(text_y),
                    ],
                ),
                Operation::new("Tj", vec![encode_text(label)]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        content
            .encode()
            .map_err(|err| PagecullError::Stamp(format!("cannot encode overlay: {err}")))
    }
}

struct BoxSample {
    sample_box: PixelBox,
    ink_ratio: f64,
    cover: [u8; 3],
}

/// Black on light covers, white on dark ones.
/// Black on covers with luminance of at least 186, white otherwise.
fn text_color([r, g, b]: [u8; 3]) -> [u8; 3] {
    // Weights scaled by 1000 so the threshold comparison is exact.
    let luminance = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    if luminance >= 186_000 { [0, 0, 0] } else { WHITE }
}
