// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-file pipeline: read, detect, combine, decide and rewrite one PDF,
// capturing every failure in the returned `FileResult`.

use std::path::Path;
use std::time::Instant;

use pagecull_core::config::RunConfig;
use pagecull_core::error::PagecullError;
use pagecull_core::{DetectionMode, FileResult, FileStatus, PageDecision, Timings};
use tracing::{info, instrument, warn};

use crate::detect::{RenderDetector, StructuralDetector, combine, summarize};
use crate::pdf::reader::PdfReader;
use crate::raster::{Rasterizer, RenderSource};
use crate::rewrite::{PageRewriter, edited_output_path};
use crate::stamp::Stamper;

/// Process one PDF.
///
/// Output goes to `out_dir`, or next to the input when `None`. Nothing is
/// propagated: read, configuration and rewrite failures all come back as a
/// result with status `failed`.
#[instrument(skip_all, fields(input = %input.display(), mode = config.mode.as_str()))]
pub fn process_pdf(
    input: &Path,
    out_dir: Option<&Path>,
    config: &RunConfig,
    rasterizer: Option<&dyn Rasterizer>,
) -> FileResult {
    let started = Instant::now();
    let mut result = FileResult::failed(input.to_path_buf(), String::new());
    result.errors.clear();
    // Status stays `Failed` until a terminal branch sets it.
    result.stamping_enabled = config.stamp.is_some();
    let finish = |mut result: FileResult| {
        result.timings.total_seconds = started.elapsed().as_secs_f64();
        info!(
            status = ?result.status,
            removed = result.pages_removed,
            output = result.pages_output,
            "File processed"
        );
        result
    };

    if let Err(err) = config.validate() {
        result.errors.push(format!("config_error: {err}"));
        return finish(result);
    }

    let mode = match (config.mode, rasterizer.is_some()) {
        (DetectionMode::Both, false) => {
            warn!("No renderer available; falling back to structural detection");
            result.warnings.push(
                "Render mode requested via mode both, but no renderer is available; \
                 falling back to structural-only detection."
                    .into(),
            );
            DetectionMode::Structural
        }
        (DetectionMode::Render, false) => {
            result.errors.push("render_requires_renderer".into());
            result
                .errors
                .push("Render mode requires a rendering backend.".into());
            return finish(result);
        }
        (mode, _) => mode,
    };

    // -- Detection ------------------------------------------------------------

    let detection_started = Instant::now();
    let reader = match PdfReader::open(input) {
        Ok(reader) => reader,
        Err(PagecullError::Encrypted) => {
            result.errors.push("encrypted".into());
            return finish(result);
        }
        Err(err) => {
            result.errors.push(format!("read_error: {err}"));
            return finish(result);
        }
    };
    let pages_original = reader.page_count();

    let structural = StructuralDetector::new(config.treat_annotations_as_empty)
        .with_debug(config.debug_structural)
        .detect(&reader);

    let render = match (mode.needs_render(), rasterizer) {
        (true, Some(rasterizer)) => {
            match RenderDetector::new(rasterizer, config).detect(RenderSource::Bytes(reader.source_bytes())) {
                Ok(report) => Some(report),
                Err(err) => {
                    result.errors.push(format!("read_error: {err}"));
                    return finish(result);
                }
            }
        }
        _ => None,
    };

    let decisions = match combine(
        mode,
        &structural.decisions,
        render.as_ref().map(|report| report.decisions.as_slice()),
    ) {
        Ok(decisions) => decisions,
        Err(err) => {
            result.errors.push(format!("read_error: {err}"));
            return finish(result);
        }
    };
    result.timings = Timings {
        detection_seconds: Some(detection_started.elapsed().as_secs_f64()),
        ..Timings::default()
    };

    result.pages_original = pages_original;
    result.decisions_summary = summarize(&decisions);
    result.structural_debug = structural.debug_records;
    result.render_debug = render.map(|report| report.debug_records).unwrap_or_default();

    let keep = pages_to_keep(&decisions);
    let pages_removed = pages_original - keep.len();
    result.pages_removed = pages_removed;
    result.pages_output = if pages_removed > 0 { keep.len() } else { pages_original };
    result.page_decisions = decisions;

    // -- Output ---------------------------------------------------------------

    if config.dry_run {
        result.status = if pages_removed > 0 {
            FileStatus::DryRun
        } else {
            FileStatus::Unchanged
        };
        return finish(result);
    }
    if pages_removed == 0 && !config.write_when_unchanged {
        result.status = FileStatus::Unchanged;
        return finish(result);
    }

    let out_dir = out_dir
        .or_else(|| input.parent().filter(|parent| !parent.as_os_str().is_empty()))
        .unwrap_or(Path::new("."));
    let output = match edited_output_path(input, out_dir) {
        Ok((output, warnings)) => {
            result.warnings.extend(warnings);
            output
        }
        Err(err) => return finish(rewrite_failed(result, &err)),
    };

    let mut rewriter = PageRewriter::new(&reader, config.bookmark_policy);
    if let Some(settings) = &config.stamp {
        let Some(rasterizer) = rasterizer else {
            result.errors.push("stamping_requires_renderer".into());
            result
                .errors
                .push("Page-number stamping requires a rendering backend.".into());
            result.pages_output = 0;
            return finish(result);
        };
        match Stamper::new(rasterizer, settings, config) {
            Ok(stamper) => rewriter = rewriter.with_stamper(stamper),
            Err(err) => return finish(rewrite_failed(result, &err)),
        }
    }

    let write_started = Instant::now();
    match rewriter.rewrite(&keep, &output) {
        Ok(rewrite) => {
            result.timings.write_seconds = Some(write_started.elapsed().as_secs_f64());
            result.status = if pages_removed > 0 {
                FileStatus::Edited
            } else {
                FileStatus::Copied
            };
            result.output_path = Some(rewrite.output_path.clone());
            result.pages_output = rewrite.pages_output;
            result.stamping_applied_pages = rewrite.stamped_pages();
            result.stamping_forced_pages = rewrite.forced_pages();
            result.stamping_skipped_pages = rewrite.skipped_pages();
            result.warnings.extend(rewrite.warnings);
            result.stamp_decisions = rewrite.stamp_decisions;
            finish(result)
        }
        Err(err) => finish(rewrite_failed(result, &err)),
    }
}

fn rewrite_failed(mut result: FileResult, err: &PagecullError) -> FileResult {
    warn!(%err, "Rewrite failed");
    result.errors.push(format!("rewrite_error: {err}"));
    result.status = FileStatus::Failed;
    result.output_path = None;
    result.pages_output = 0;
    result
}

/// Indices of the pages a decision list keeps.
fn pages_to_keep(decisions: &[PageDecision]) -> Vec<usize> {
    decisions
        .iter()
        .filter(|decision| !decision.is_empty)
        .map(|decision| decision.page_index)
        .collect()
}
