// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ink sampling — classify rendered pixels against a white background, derive
// pixel-space sample boxes from inch measurements, and compute the median
// colour of a region. Operates on in-memory `image` buffers; per-channel
// histograms come from `imageproc`.

use image::{Rgba, RgbaImage, imageops};
use imageproc::stats::histogram;
use pagecull_core::{InkMeasurement, PixelBox};

/// Classifies pixels as background or ink.
///
/// A pixel is background when it is fully transparent, or when every colour
/// channel reaches `white_threshold`.
#[derive(Debug, Clone, Copy)]
pub struct InkSampler {
    white_threshold: u8,
}

impl InkSampler {
    pub fn new(white_threshold: u8) -> Self {
        Self { white_threshold }
    }

    pub fn is_background(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, a] = pixel.0;
        a == 0 || (r >= self.white_threshold && g >= self.white_threshold && b >= self.white_threshold)
    }

    /// Measure the share of non-background pixels inside `sample`.
    ///
    /// The box is clamped to the image. An empty box yields a ratio of zero
    /// with nothing sampled.
    pub fn measure(&self, image: &RgbaImage, sample: PixelBox) -> InkMeasurement {
        let sample = clamp_box(sample, image.width(), image.height());
        if sample.is_degenerate() {
            return InkMeasurement {
                sample_box_px: sample,
                total_pixels_sampled: 0,
                nonwhite_pixel_count: 0,
                ink_ratio: 0.0,
                min_rgb: None,
                max_rgb: None,
            };
        }

        let mut nonwhite = 0u64;
        let mut min_rgb = [u8::MAX; 3];
        let mut max_rgb = [u8::MIN; 3];
        for y in sample.y0..sample.y1 {
            for x in sample.x0..sample.x1 {
                let pixel = image.get_pixel(x, y);
                for channel in 0..3 {
                    min_rgb[channel] = min_rgb[channel].min(pixel.0[channel]);
                    max_rgb[channel] = max_rgb[channel].max(pixel.0[channel]);
                }
                if !self.is_background(pixel) {
                    nonwhite += 1;
                }
            }
        }

        let total = sample.area();
        InkMeasurement {
            sample_box_px: sample,
            total_pixels_sampled: total,
            nonwhite_pixel_count: nonwhite,
            ink_ratio: nonwhite as f64 / total as f64,
            min_rgb: Some(min_rgb),
            max_rgb: Some(max_rgb),
        }
    }
}

fn clamp_box(sample: PixelBox, width: u32, height: u32) -> PixelBox {
    let x0 = sample.x0.min(width);
    let y0 = sample.y0.min(height);
    PixelBox {
        x0,
        y0,
        x1: sample.x1.clamp(x0, width),
        y1: sample.y1.clamp(y0, height),
    }
}

fn inches_to_px(inches: f64, dpi: u32) -> i64 {
    (inches * f64::from(dpi)).round() as i64
}

fn clamp_px(value: i64, limit: u32) -> u32 {
    value.clamp(0, i64::from(limit)) as u32
}

/// Sample box inset by `[top, right, bottom, left]` inches from each edge.
pub fn pixel_box_from_margins(width: u32, height: u32, margins_in: [f64; 4], dpi: u32) -> PixelBox {
    let [top, right, bottom, left] = margins_in.map(|m| inches_to_px(m, dpi));
    let x0 = clamp_px(left, width);
    let y0 = clamp_px(top, height);
    PixelBox {
        x0,
        y0,
        x1: clamp_px(i64::from(width) - right, width).max(x0),
        y1: clamp_px(i64::from(height) - bottom, height).max(y0),
    }
}

/// Pixel box for an `(x, y, width, height)` rectangle given in inches from the
/// bottom-left corner of the page. The result uses a top-left origin.
pub fn pixel_box_from_rect(width: u32, height: u32, box_in: [f64; 4], dpi: u32) -> PixelBox {
    let [x, y, w, h] = box_in;
    let left = inches_to_px(x, dpi);
    let bottom = inches_to_px(y, dpi);
    let right = inches_to_px(x + w, dpi);
    let top = inches_to_px(y + h, dpi);
    let height_px = i64::from(height);
    PixelBox {
        x0: clamp_px(left, width),
        y0: clamp_px(height_px - top, height),
        x1: clamp_px(right, width),
        y1: clamp_px(height_px - bottom, height),
    }
}

/// Per-channel median RGB over `sample`, taking the upper median (element
/// `len / 2` of the sorted values). `None` for an empty box.
pub fn median_rgb(image: &RgbaImage, sample: PixelBox) -> Option<[u8; 3]> {
    let sample = clamp_box(sample, image.width(), image.height());
    if sample.is_degenerate() {
        return None;
    }

    let region = imageops::crop_imm(image, sample.x0, sample.y0, sample.width(), sample.height())
        .to_image();
    let counts = histogram(&region);
    let middle = sample.area() / 2;

    let mut out = [0u8; 3];
    for (slot, channel) in out.iter_mut().zip(counts.channels.iter()) {
        let mut seen = 0u64;
        for (value, count) in channel.iter().enumerate() {
            seen += u64::from(*count);
            if seen > middle {
                *slot = value as u8;
                break;
            }
        }
    }
    Some(out)
}
